//! Regression accuracy metrics over evaluated prediction/actual pairs.

/// The five metrics kept in a model's analytics snapshot.
///
/// Values are rounded to the display precision the rest of the platform
/// expects: accuracy to 2 decimal places, the error metrics and R² to 4.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    /// `100 - MAPE`, in percent.
    pub accuracy: f64,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compute metrics over parallel prediction/actual sequences.
    ///
    /// Callers must supply equal-length, non-empty slices; the aggregator
    /// only hands over the evaluated pairs and skips the call entirely when
    /// there are none.
    ///
    /// The MAPE mean excludes every index where the actual is zero from its
    /// denominator, a known approximation that shrinks the effective sample
    /// rather than dividing by zero. When every actual is zero the MAPE is 0
    /// and accuracy reports 100.
    ///
    /// When all actuals are identical (`SS_tot == 0`), R² is defined as 0.
    pub fn compute(predictions: &[f64], actuals: &[f64]) -> Self {
        debug_assert_eq!(predictions.len(), actuals.len());
        debug_assert!(!predictions.is_empty());

        let n = predictions.len() as f64;

        // Mean Absolute Percentage Error over nonzero actuals
        let mut mape_sum = 0.0;
        let mut mape_count = 0u32;
        for (prediction, actual) in predictions.iter().zip(actuals) {
            if *actual != 0.0 {
                mape_sum += ((actual - prediction) / actual).abs();
                mape_count += 1;
            }
        }
        let mape = if mape_count > 0 { mape_sum / f64::from(mape_count) * 100.0 } else { 0.0 };
        let accuracy = 100.0 - mape;

        let mae = predictions.iter().zip(actuals).map(|(p, a)| (a - p).abs()).sum::<f64>() / n;

        let mse = predictions.iter().zip(actuals).map(|(p, a)| (a - p) * (a - p)).sum::<f64>() / n;
        let rmse = mse.sqrt();

        // R² coefficient of determination, 1 - SS_res/SS_tot
        let mean_actual = actuals.iter().sum::<f64>() / n;
        let ss_res = predictions.iter().zip(actuals).map(|(p, a)| (a - p) * (a - p)).sum::<f64>();
        let ss_tot = actuals.iter().map(|a| (a - mean_actual) * (a - mean_actual)).sum::<f64>();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            accuracy: round_to(accuracy, 2),
            mae: round_to(mae, 4),
            mse: round_to(mse, 4),
            rmse: round_to(rmse, 4),
            r2: round_to(r2, 4),
        }
    }
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
