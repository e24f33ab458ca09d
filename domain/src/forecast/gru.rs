//! Gated recurrent unit network for one-step-ahead time series prediction.
//!
//! The network reads one scalar per time step and predicts the value of the next step.
//! Forecasting beyond the observed data feeds each prediction back in as the next input.
//!
//! All parameters live in one flat vector (see [`Layout`]) so that the optimizer can treat
//! them uniformly.

use super::control::TrainingControl;
use log::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::ops::Range;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Errors raised while training a model or forecasting with it.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    /// The series is too short to form a single (input, target) pair.
    NotEnoughPoints { required: usize, available: usize },
    /// The cancellation flag was raised.
    Cancelled,
    /// The training deadline passed.
    DeadlineExceeded,
    /// The training error stopped being a finite number.
    Diverged { iteration: u32 },
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingError::NotEnoughPoints {
                required,
                available,
            } => write!(
                f,
                "Training needs at least {required} points, got {available}"
            ),
            TrainingError::Cancelled => write!(f, "Training was cancelled"),
            TrainingError::DeadlineExceeded => write!(f, "Training exceeded its deadline"),
            TrainingError::Diverged { iteration } => {
                write!(f, "Training diverged at iteration {iteration}")
            }
        }
    }
}

impl std::error::Error for TrainingError {}

/// Knobs for a single training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    /// Maximum number of passes over the series
    pub iterations: u32,
    /// Training stops as soon as the error drops below this value
    pub error_threshold: f64,
    /// `on_progress` fires at iteration 1 and every `callback_period` iterations
    pub callback_period: u32,
    pub learning_rate: f64,
}

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingStatus {
    pub iteration: u32,
    pub error: f64,
}

/// Outcome of a completed training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSummary {
    pub iterations_run: u32,
    pub error: f64,
}

/// A model that learns a univariate series and extrapolates it.
pub trait SequenceModel {
    /// Short identifier reported alongside forecasts.
    fn kind(&self) -> &'static str;

    /// Fits the model to `series`, calling `on_progress` periodically.
    fn train(
        &mut self,
        series: &[f64],
        options: &TrainingOptions,
        control: &TrainingControl,
        on_progress: &mut dyn FnMut(TrainingStatus),
    ) -> Result<TrainingSummary, TrainingError>;

    /// Predicts the `steps` values that follow `series`.
    fn forecast(&self, series: &[f64], steps: usize) -> Result<Vec<f64>, TrainingError>;
}

#[derive(Clone, Copy)]
enum Gate {
    Update = 0,
    Reset = 1,
    Candidate = 2,
}

/// Offsets of each parameter block inside the flat parameter vector.
///
/// Per gate: input weights `w` (H), recurrent weights `u` (H x H, row major), bias `b` (H).
/// Then the output layer: weights (H) and a single bias.
#[derive(Debug, Clone, Copy)]
struct Layout {
    hidden: usize,
}

impl Layout {
    fn gate_len(&self) -> usize {
        self.hidden * (self.hidden + 2)
    }

    fn w(&self, gate: Gate) -> Range<usize> {
        let start = gate as usize * self.gate_len();
        start..start + self.hidden
    }

    fn u(&self, gate: Gate) -> Range<usize> {
        let start = gate as usize * self.gate_len() + self.hidden;
        start..start + self.hidden * self.hidden
    }

    fn b(&self, gate: Gate) -> Range<usize> {
        let start = gate as usize * self.gate_len() + self.hidden + self.hidden * self.hidden;
        start..start + self.hidden
    }

    fn out_w(&self) -> Range<usize> {
        let start = 3 * self.gate_len();
        start..start + self.hidden
    }

    fn out_b(&self) -> usize {
        3 * self.gate_len() + self.hidden
    }

    fn len(&self) -> usize {
        self.out_b() + 1
    }
}

/// Activations kept from the forward pass for backpropagation.
struct StepCache {
    x: f64,
    h_prev: Vec<f64>,
    z: Vec<f64>,
    r: Vec<f64>,
    candidate: Vec<f64>,
    h: Vec<f64>,
    y: f64,
}

/// Adam moment estimates.
struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f64], grads: &[f64], learning_rate: f64) {
        self.t += 1;
        let bias1 = 1.0 - ADAM_BETA1.powi(self.t);
        let bias2 = 1.0 - ADAM_BETA2.powi(self.t);

        for i in 0..params.len() {
            let g = grads[i];
            self.m[i] = ADAM_BETA1 * self.m[i] + (1.0 - ADAM_BETA1) * g;
            self.v[i] = ADAM_BETA2 * self.v[i] + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = self.m[i] / bias1;
            let v_hat = self.v[i] / bias2;
            params[i] -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        }
    }
}

/// Single-layer GRU with a linear read-out, one input and one output per time step.
#[derive(Debug, Clone)]
pub struct GruTimeStep {
    layout: Layout,
    params: Vec<f64>,
    gradient_clip: f64,
}

impl GruTimeStep {
    pub const KIND: &'static str = "gru-time-step";

    /// Creates a network with `hidden` units, initialized from a fixed seed so that
    /// training the same series twice yields the same model.
    pub fn new(hidden: usize, seed: u64) -> Self {
        let hidden = hidden.max(1);
        let layout = Layout { hidden };
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = 1.0 / (hidden as f64).sqrt();

        let mut params: Vec<f64> = (0..layout.len())
            .map(|_| rng.gen_range(-scale..scale))
            .collect();
        for gate in [Gate::Update, Gate::Reset, Gate::Candidate] {
            params[layout.b(gate)].iter_mut().for_each(|b| *b = 0.0);
        }
        params[layout.out_b()] = 0.0;

        Self {
            layout,
            params,
            gradient_clip: 5.0,
        }
    }

    fn step(&self, x: f64, h_prev: &[f64]) -> StepCache {
        let hidden = self.layout.hidden;
        let p = &self.params;

        let gate = |gate: Gate, state: &[f64], activation: fn(f64) -> f64| -> Vec<f64> {
            let w = &p[self.layout.w(gate)];
            let u = &p[self.layout.u(gate)];
            let b = &p[self.layout.b(gate)];
            (0..hidden)
                .map(|i| {
                    let recurrent: f64 = (0..hidden).map(|j| u[i * hidden + j] * state[j]).sum();
                    activation(w[i] * x + recurrent + b[i])
                })
                .collect()
        };

        let z = gate(Gate::Update, h_prev, sigmoid);
        let r = gate(Gate::Reset, h_prev, sigmoid);
        let reset_state: Vec<f64> = r.iter().zip(h_prev).map(|(r, h)| r * h).collect();
        let candidate = gate(Gate::Candidate, &reset_state, f64::tanh);

        let h: Vec<f64> = (0..hidden)
            .map(|i| (1.0 - z[i]) * h_prev[i] + z[i] * candidate[i])
            .collect();

        let out_w = &p[self.layout.out_w()];
        let y = out_w.iter().zip(&h).map(|(w, h)| w * h).sum::<f64>() + p[self.layout.out_b()];

        StepCache {
            x,
            h_prev: h_prev.to_vec(),
            z,
            r,
            candidate,
            h,
            y,
        }
    }

    /// Runs the network over `inputs`, returning the cache of every step.
    fn unroll(&self, inputs: &[f64]) -> Vec<StepCache> {
        let mut h = vec![0.0; self.layout.hidden];
        let mut caches = Vec::with_capacity(inputs.len());
        for &x in inputs {
            let cache = self.step(x, &h);
            h.clone_from(&cache.h);
            caches.push(cache);
        }
        caches
    }

    /// Mean squared error of the one-step predictions and its gradient, via backpropagation
    /// through time.
    fn loss_and_gradient(&self, series: &[f64]) -> (f64, Vec<f64>) {
        let hidden = self.layout.hidden;
        let inputs = &series[..series.len() - 1];
        let targets = &series[1..];
        let caches = self.unroll(inputs);
        let steps = caches.len() as f64;

        let p = &self.params;
        let mut grads = vec![0.0; p.len()];
        let mut loss = 0.0;
        let mut dh_next = vec![0.0; hidden];

        let out_w_range = self.layout.out_w();
        let out_b = self.layout.out_b();

        for (cache, target) in caches.iter().zip(targets).rev() {
            let diff = cache.y - target;
            loss += diff * diff;
            let dy = 2.0 * diff / steps;

            grads[out_b] += dy;
            let mut dh = dh_next.clone();
            for i in 0..hidden {
                grads[out_w_range.start + i] += dy * cache.h[i];
                dh[i] += dy * p[out_w_range.start + i];
            }

            let mut dh_prev = vec![0.0; hidden];
            let mut da_z = vec![0.0; hidden];
            let mut da_c = vec![0.0; hidden];
            for i in 0..hidden {
                let dz = dh[i] * (cache.candidate[i] - cache.h_prev[i]);
                let dc = dh[i] * cache.z[i];
                dh_prev[i] += dh[i] * (1.0 - cache.z[i]);
                da_z[i] = dz * cache.z[i] * (1.0 - cache.z[i]);
                da_c[i] = dc * (1.0 - cache.candidate[i] * cache.candidate[i]);
            }

            // Candidate gate consumed r * h_prev.
            let reset_state: Vec<f64> = cache
                .r
                .iter()
                .zip(&cache.h_prev)
                .map(|(r, h)| r * h)
                .collect();
            let d_reset_state =
                self.accumulate_gate(Gate::Candidate, &da_c, cache.x, &reset_state, &mut grads);

            let mut da_r = vec![0.0; hidden];
            for i in 0..hidden {
                let dr = d_reset_state[i] * cache.h_prev[i];
                dh_prev[i] += d_reset_state[i] * cache.r[i];
                da_r[i] = dr * cache.r[i] * (1.0 - cache.r[i]);
            }

            let from_update =
                self.accumulate_gate(Gate::Update, &da_z, cache.x, &cache.h_prev, &mut grads);
            let from_reset =
                self.accumulate_gate(Gate::Reset, &da_r, cache.x, &cache.h_prev, &mut grads);
            for i in 0..hidden {
                dh_prev[i] += from_update[i] + from_reset[i];
            }

            dh_next = dh_prev;
        }

        for g in grads.iter_mut() {
            *g = g.clamp(-self.gradient_clip, self.gradient_clip);
        }

        (loss / steps, grads)
    }

    /// Adds the parameter gradients of one gate given the gradient of its pre-activation,
    /// returning the gradient with respect to the recurrent `state` the gate consumed.
    fn accumulate_gate(
        &self,
        gate: Gate,
        d_pre: &[f64],
        x: f64,
        state: &[f64],
        grads: &mut [f64],
    ) -> Vec<f64> {
        let hidden = self.layout.hidden;
        let w = self.layout.w(gate);
        let u = self.layout.u(gate);
        let b = self.layout.b(gate);
        let mut d_state = vec![0.0; hidden];

        for i in 0..hidden {
            grads[w.start + i] += d_pre[i] * x;
            grads[b.start + i] += d_pre[i];
            for j in 0..hidden {
                grads[u.start + i * hidden + j] += d_pre[i] * state[j];
                d_state[j] += self.params[u.start + i * hidden + j] * d_pre[i];
            }
        }

        d_state
    }
}

impl SequenceModel for GruTimeStep {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn train(
        &mut self,
        series: &[f64],
        options: &TrainingOptions,
        control: &TrainingControl,
        on_progress: &mut dyn FnMut(TrainingStatus),
    ) -> Result<TrainingSummary, TrainingError> {
        if series.len() < 2 {
            return Err(TrainingError::NotEnoughPoints {
                required: 2,
                available: series.len(),
            });
        }

        let callback_period = options.callback_period.max(1);
        let mut optimizer = Adam::new(self.params.len());
        let mut summary = TrainingSummary {
            iterations_run: 0,
            error: f64::INFINITY,
        };
        let mut last_reported = 0;

        for iteration in 1..=options.iterations {
            control.check()?;

            let (error, grads) = self.loss_and_gradient(series);
            if !error.is_finite() {
                return Err(TrainingError::Diverged { iteration });
            }
            optimizer.step(&mut self.params, &grads, options.learning_rate);

            summary = TrainingSummary {
                iterations_run: iteration,
                error,
            };

            if iteration == 1 || iteration % callback_period == 0 {
                on_progress(TrainingStatus { iteration, error });
                last_reported = iteration;
            }

            if error < options.error_threshold {
                debug!("Training reached error {error:.6} at iteration {iteration}");
                break;
            }
        }

        if summary.iterations_run > 0 && last_reported != summary.iterations_run {
            on_progress(TrainingStatus {
                iteration: summary.iterations_run,
                error: summary.error,
            });
        }

        Ok(summary)
    }

    fn forecast(&self, series: &[f64], steps: usize) -> Result<Vec<f64>, TrainingError> {
        if series.is_empty() {
            return Err(TrainingError::NotEnoughPoints {
                required: 1,
                available: 0,
            });
        }

        let caches = self.unroll(series);
        // unroll always yields one cache per input and `series` is non-empty
        let last = &caches[caches.len() - 1];
        let mut h = last.h.clone();
        let mut next = last.y;
        let mut predictions = Vec::with_capacity(steps);

        for _ in 0..steps {
            predictions.push(next);
            let cache = self.step(next, &h);
            h = cache.h;
            next = cache.y;
        }

        Ok(predictions)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(iterations: u32) -> TrainingOptions {
        TrainingOptions {
            iterations,
            error_threshold: 0.0,
            callback_period: 10,
            learning_rate: 0.01,
        }
    }

    fn sawtooth() -> Vec<f64> {
        (0..24).map(|i| (i % 6) as f64 / 5.0).collect()
    }

    #[test]
    fn layout_blocks_do_not_overlap() {
        let layout = Layout { hidden: 3 };

        assert_eq!(layout.w(Gate::Update), 0..3);
        assert_eq!(layout.u(Gate::Update), 3..12);
        assert_eq!(layout.b(Gate::Update), 12..15);
        assert_eq!(layout.w(Gate::Reset), 15..18);
        assert_eq!(layout.b(Gate::Candidate), 42..45);
        assert_eq!(layout.out_w(), 45..48);
        assert_eq!(layout.out_b(), 48);
        assert_eq!(layout.len(), 49);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mut model = GruTimeStep::new(3, 7);
        model.gradient_clip = f64::INFINITY;
        let series = [0.1, 0.5, 0.3, 0.9, 0.2];

        let (_, grads) = model.loss_and_gradient(&series);

        let epsilon = 1e-6;
        for index in [0, 4, 13, 20, 35, 44, 46, 48] {
            let original = model.params[index];
            model.params[index] = original + epsilon;
            let (plus, _) = model.loss_and_gradient(&series);
            model.params[index] = original - epsilon;
            let (minus, _) = model.loss_and_gradient(&series);
            model.params[index] = original;

            let numeric = (plus - minus) / (2.0 * epsilon);
            assert!(
                (numeric - grads[index]).abs() < 1e-5,
                "gradient mismatch at {index}: analytic {} numeric {numeric}",
                grads[index]
            );
        }
    }

    #[test]
    fn training_reduces_error() {
        let mut model = GruTimeStep::new(8, 1);
        let series = sawtooth();
        let mut first_error = None;

        let summary = model
            .train(
                &series,
                &options(300),
                &TrainingControl::unbounded(),
                &mut |status| {
                    first_error.get_or_insert(status.error);
                },
            )
            .unwrap();

        assert_eq!(summary.iterations_run, 300);
        assert!(summary.error < first_error.unwrap());
    }

    #[test]
    fn progress_fires_at_first_period_and_final_iterations() {
        let mut model = GruTimeStep::new(4, 1);
        let mut reported = Vec::new();

        model
            .train(
                &sawtooth(),
                &options(25),
                &TrainingControl::unbounded(),
                &mut |status| reported.push(status.iteration),
            )
            .unwrap();

        assert_eq!(reported, vec![1, 10, 20, 25]);
    }

    #[test]
    fn training_stops_early_below_error_threshold() {
        let mut model = GruTimeStep::new(4, 1);
        let mut opts = options(1_000);
        opts.error_threshold = f64::INFINITY;

        let summary = model
            .train(&sawtooth(), &opts, &TrainingControl::unbounded(), &mut |_| {})
            .unwrap();

        assert_eq!(summary.iterations_run, 1);
    }

    #[test]
    fn training_observes_cancellation() {
        let mut model = GruTimeStep::new(4, 1);
        let control = TrainingControl::unbounded();
        control.cancel();

        let result = model.train(&sawtooth(), &options(10), &control, &mut |_| {});

        assert_eq!(result, Err(TrainingError::Cancelled));
    }

    #[test]
    fn training_requires_two_points() {
        let mut model = GruTimeStep::new(4, 1);

        let result = model.train(&[0.5], &options(10), &TrainingControl::unbounded(), &mut |_| {});

        assert_eq!(
            result,
            Err(TrainingError::NotEnoughPoints {
                required: 2,
                available: 1
            })
        );
    }

    #[test]
    fn untrained_model_forecasts_from_a_single_point() {
        let model = GruTimeStep::new(4, 1);

        let predictions = model.forecast(&[0.3], 12).unwrap();

        assert_eq!(predictions.len(), 12);
        assert!(predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn forecast_returns_requested_number_of_steps() {
        let mut model = GruTimeStep::new(4, 1);
        let series = sawtooth();
        model
            .train(&series, &options(20), &TrainingControl::unbounded(), &mut |_| {})
            .unwrap();

        for steps in [1, 6, 12] {
            let predictions = model.forecast(&series, steps).unwrap();
            assert_eq!(predictions.len(), steps);
            assert!(predictions.iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn same_seed_yields_same_model() {
        let series = sawtooth();
        let train = || {
            let mut model = GruTimeStep::new(4, 99);
            model
                .train(&series, &options(15), &TrainingControl::unbounded(), &mut |_| {})
                .unwrap();
            model.forecast(&series, 3).unwrap()
        };

        assert_eq!(train(), train());
    }
}
