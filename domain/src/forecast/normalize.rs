/// A series rescaled to [0, 1] together with the bounds needed to undo the scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub values: Vec<f64>,
    pub min: f64,
    pub max: f64,
}

impl NormalizedSeries {
    /// Min-max scales `raw`. A flat series has a range of zero; the range is floored to 1 so
    /// that every value maps to 0 instead of dividing by zero.
    pub fn new(raw: &[f64]) -> Self {
        let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (min, max) = if raw.is_empty() { (0.0, 0.0) } else { (min, max) };

        let mut series = Self {
            values: Vec::with_capacity(raw.len()),
            min,
            max,
        };
        let range = series.range();
        series.values = raw.iter().map(|v| (v - min) / range).collect();
        series
    }

    pub fn range(&self) -> f64 {
        let range = self.max - self.min;
        if range > 0.0 {
            range
        } else {
            1.0
        }
    }

    pub fn denormalize(&self, value: f64) -> f64 {
        value * self.range() + self.min
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
