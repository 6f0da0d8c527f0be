use crate::structs::{ColumnStats, CorrelationEntry, PipelineError, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};

impl ColumnStats {
    /// Calculate statistics for a vector of values
    ///
    /// # Errors
    /// Returns error if values is empty
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate(name: &str, values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(PipelineError::Stats(
                "Cannot calculate stats for empty data".into(),
            ));
        }

        let count = values.len();
        let mean = mean(values);

        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        let std_dev = variance.sqrt();

        let sorted = sorted(values);

        let min = sorted[0];
        let max = sorted[count - 1];

        let q1 = percentile(&sorted, 25.0);
        let median = percentile(&sorted, 50.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;

        Ok(Self {
            name: name.to_string(),
            count,
            mean,
            std_dev,
            min,
            max,
            q1,
            median,
            q3,
            iqr,
        })
    }
}

/// Arithmetic mean, NaN for empty input
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Ascending copy of the values
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Median of unsorted values, `None` when empty
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(percentile(&sorted(values), 50.0))
}

/// Calculate percentile using linear interpolation
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let k = (p / 100.0) * (sorted.len() - 1) as f64;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;

    if f == c {
        sorted[f]
    } else {
        let d0 = sorted[f] * (c as f64 - k);
        let d1 = sorted[c] * (k - f as f64);
        d0 + d1
    }
}

/// Two-sided p-value of a t statistic; NaN when undefined
#[must_use]
pub fn two_sided_t_p_value(t: f64, df: f64) -> f64 {
    if !t.is_finite() || df <= 0.0 {
        if t.is_infinite() && df > 0.0 {
            return 0.0;
        }
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

/// Upper `alpha / 2` quantile of Student's t, NaN when undefined
#[must_use]
pub fn t_critical(confidence: f64, df: f64) -> f64 {
    if df <= 0.0 {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => dist.inverse_cdf(1.0 - (1.0 - confidence) / 2.0),
        Err(_) => f64::NAN,
    }
}

/// Pearson correlation coefficient between two variables
///
/// # Errors
/// Returns error if vectors have different lengths, fewer than 2 values,
/// or either has zero variance
#[allow(clippy::cast_precision_loss)]
pub fn correlation(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(PipelineError::Stats("Vectors must have same length".into()));
    }
    if x.len() < 2 {
        return Err(PipelineError::Stats(
            "Need at least 2 values for correlation".into(),
        ));
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return Err(PipelineError::Stats(
            "Correlation undefined for a constant input".into(),
        ));
    }

    Ok((cov / denom).clamp(-1.0, 1.0))
}

/// Pearson correlation with a two-sided significance test (t with n - 2 df)
///
/// # Errors
/// Same conditions as [`correlation`]
#[allow(clippy::cast_precision_loss)]
pub fn pearson(x: &[f64], y: &[f64]) -> Result<CorrelationEntry> {
    let r = correlation(x, y)?;
    let df = (x.len() - 2) as f64;

    let p_value = if df == 0.0 {
        1.0
    } else if r.abs() >= 1.0 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        two_sided_t_p_value(t, df)
    };

    Ok(CorrelationEntry { corr: r, p_value })
}
