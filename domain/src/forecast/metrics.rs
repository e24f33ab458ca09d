//! Forecast accuracy measures.

/// Mean squared error. Pairs beyond the shorter slice are ignored; empty input yields 0.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Mean absolute percentage error in percent. Points whose actual value is zero are skipped;
/// `None` when no point remains.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.iter().sum::<f64>() / errors.len() as f64 * 100.0)
    }
}

pub fn format_mse(value: f64) -> String {
    format!("{value:.4}")
}

pub fn format_mape(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}%"),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_averages_squared_differences() {
        assert_eq!(mse(&[1.0, 2.0], &[2.0, 4.0]), 2.5);
        assert_eq!(mse(&[], &[]), 0.0);
    }

    #[test]
    fn mape_skips_zero_actuals() {
        let value = mape(&[0.0, 0.5, 1.0], &[0.3, 0.25, 0.5]).unwrap();

        assert!((value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn mape_is_undefined_when_every_actual_is_zero() {
        assert_eq!(mape(&[0.0, 0.0], &[0.1, 0.2]), None);
        assert_eq!(format_mape(None), "N/A");
    }

    #[test]
    fn formatting_uses_fixed_precision() {
        assert_eq!(format_mse(0.012345), "0.0123");
        assert_eq!(format_mape(Some(7.456)), "7.46%");
    }
}
