//! Ordinary least squares with inference statistics

use crate::ml::features::{SLEEP_HOURS_C, STRESS_LEVEL_C, STRESS_SLEEP_INTERACTION_C};
use crate::ml::stats::{t_critical, two_sided_t_p_value};
use crate::schema::StudentSchema;
use crate::structs::{Coefficient, Dataset, FittedModel, PipelineError, Result, VifEntry};
use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::f64::consts::PI;
use tracing::info;

/// Name of the intercept column
pub const CONST: &str = "const";

/// Predictors of the interaction model, in design order after `const`
pub const PREDICTORS: [&str; 3] = [STRESS_LEVEL_C, SLEEP_HOURS_C, STRESS_SLEEP_INTERACTION_C];

/// Relative pivot size below which `X'X` is treated as singular
const RANK_TOLERANCE: f64 = 1e-10;

/// Confidence level of reported coefficient intervals
pub const CONFIDENCE: f64 = 0.95;

/// Mean prediction with its confidence band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Invert a square matrix by Gauss-Jordan elimination with partial pivoting
///
/// # Errors
/// Returns error if the matrix is not square or is numerically singular
pub fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(PipelineError::Model("Cannot invert a non-square matrix".into()));
    }

    let scale = matrix
        .diag()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return Err(PipelineError::Model(
            "Design matrix is rank deficient (all-zero columns)".into(),
        ));
    }

    let mut a = matrix.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);

        if a[[pivot_row, col]].abs() < RANK_TOLERANCE * scale {
            return Err(PipelineError::Model(format!(
                "Design matrix is rank deficient (collinear column {col})"
            )));
        }

        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
                inv.swap([col, k], [pivot_row, k]);
            }
        }

        let pivot = a[[col, col]];
        for k in 0..n {
            a[[col, k]] /= pivot;
            inv[[col, k]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[[row, k]] -= factor * a[[col, k]];
                inv[[row, k]] -= factor * inv[[col, k]];
            }
        }
    }

    Ok(inv)
}

/// Build a design matrix with a leading intercept column
///
/// # Errors
/// Returns error if a predictor column is absent, non-numeric or has gaps
pub fn design_matrix(dataset: &Dataset, predictors: &[&str]) -> Result<(Vec<String>, Array2<f64>)> {
    let n = dataset.row_count();
    let mut names = vec![CONST.to_string()];
    let mut x = Array2::<f64>::ones((n, predictors.len() + 1));

    for (j, name) in predictors.iter().enumerate() {
        let values = dataset.numeric_column(name)?;
        x.column_mut(j + 1).assign(&Array1::from(values));
        names.push((*name).to_string());
    }

    Ok((names, x))
}

/// Least-squares coefficients and `(X'X)^-1`
fn solve(x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let xtx = x.t().dot(x);
    let xtx_inv = invert(&xtx)?;
    let beta = xtx_inv.dot(&x.t().dot(y));
    Ok((beta, xtx_inv))
}

/// Fit `y = X beta` by ordinary least squares
///
/// `x` must contain the intercept column; `names` labels its columns.
///
/// # Errors
/// Returns error on shape mismatch, fewer rows than parameters, or a
/// rank-deficient design
#[allow(clippy::cast_precision_loss, clippy::similar_names)]
pub fn fit_ols(
    names: &[String],
    x: &Array2<f64>,
    y: &Array1<f64>,
    dependent: &str,
) -> Result<FittedModel> {
    let (n, p) = x.dim();
    if names.len() != p || y.len() != n {
        return Err(PipelineError::Model(format!(
            "Shape mismatch: {n}x{p} design, {} names, {} targets",
            names.len(),
            y.len()
        )));
    }
    if n < p {
        return Err(PipelineError::Model(format!(
            "Need at least {p} observations to fit {p} parameters, got {n}"
        )));
    }

    let (beta, xtx_inv) = solve(x, y)?;

    let fitted = x.dot(&beta);
    let residuals = y - &fitted;
    let ssr = residuals.dot(&residuals);
    let y_mean = y.mean().unwrap_or(f64::NAN);
    let sst = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>();

    let df_resid = n - p;
    let df_model = p.saturating_sub(1);
    let df_resid_f = df_resid as f64;
    let sigma2 = if df_resid > 0 { ssr / df_resid_f } else { f64::NAN };
    let cov_params = &xtx_inv * sigma2;

    let t_crit = t_critical(CONFIDENCE, df_resid_f);
    let coefficients = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_error = cov_params[[j, j]].sqrt();
            let t_value = estimate / std_error;
            Coefficient {
                name: name.clone(),
                estimate,
                std_error,
                t_value,
                p_value: two_sided_t_p_value(t_value, df_resid_f),
                ci_lower: estimate - t_crit * std_error,
                ci_upper: estimate + t_crit * std_error,
            }
        })
        .collect();

    let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { f64::NAN };
    let adj_r_squared = if df_resid > 0 {
        1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_resid_f
    } else {
        f64::NAN
    };

    let (f_statistic, f_p_value) = if df_model > 0 && df_resid > 0 {
        let f = ((sst - ssr) / df_model as f64) / sigma2;
        let p_value = FisherSnedecor::new(df_model as f64, df_resid_f)
            .map_or(f64::NAN, |dist| dist.sf(f));
        (f, p_value)
    } else {
        (f64::NAN, f64::NAN)
    };

    let n_f = n as f64;
    let log_likelihood = -n_f / 2.0 * ((2.0 * PI).ln() + (ssr / n_f).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * p as f64;
    let bic = -2.0 * log_likelihood + p as f64 * n_f.ln();

    Ok(FittedModel {
        dependent: dependent.to_string(),
        coefficients,
        fitted_values: fitted.to_vec(),
        residuals: residuals.to_vec(),
        n_obs: n,
        df_model,
        df_resid,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_p_value,
        log_likelihood,
        aic,
        bic,
        cov_params,
    })
}

/// Regress the target on centered stress, centered sleep and their product
///
/// # Errors
/// Returns error if a column is missing, the design is rank deficient,
/// or there are fewer rows than parameters
pub fn build_interaction_regression_model(
    dataset: &Dataset,
    schema: &StudentSchema,
) -> Result<FittedModel> {
    info!("Building regression model with interaction");

    let (names, x) = design_matrix(dataset, &PREDICTORS)?;
    let y = Array1::from(dataset.numeric_column(&schema.target)?);
    let model = fit_ols(&names, &x, &y, &schema.target)?;

    info!("Model fitting completed");
    Ok(model)
}

/// Variance inflation factor of each predictor and the intercept
///
/// Each design column is regressed on the remaining ones; `VIF = 1 / (1 - R^2)`.
///
/// # Errors
/// Returns error if a column is unusable or a sub-design is rank deficient
#[allow(clippy::cast_precision_loss)]
pub fn variance_inflation_factors(dataset: &Dataset, predictors: &[&str]) -> Result<Vec<VifEntry>> {
    let (mut names, design) = design_matrix(dataset, predictors)?;
    // Report predictors first, intercept last
    names.rotate_left(1);
    let mut order: Vec<usize> = (1..design.ncols()).collect();
    order.push(0);
    let x = design.select(Axis(1), &order);

    let mut entries = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let target = x.column(i).to_owned();
        let others: Vec<usize> = (0..x.ncols()).filter(|&j| j != i).collect();
        let rest = x.select(Axis(1), &others);

        let (beta, _) = solve(&rest, &target)?;
        let resid = &target - &rest.dot(&beta);
        let ssr = resid.dot(&resid);

        // Centered R^2 when the regressors include the intercept, uncentered otherwise
        let has_intercept = name != CONST;
        let sst = if has_intercept {
            let m = target.mean().unwrap_or(0.0);
            target.iter().map(|v| (v - m).powi(2)).sum::<f64>()
        } else {
            target.dot(&target)
        };
        let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { 0.0 };

        let vif = if r_squared >= 1.0 {
            f64::INFINITY
        } else {
            1.0 / (1.0 - r_squared)
        };
        entries.push(VifEntry {
            feature: name.clone(),
            vif,
        });
    }

    Ok(entries)
}

impl FittedModel {
    #[must_use]
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Estimates in design order
    #[must_use]
    pub fn params(&self) -> Array1<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    /// Predicted means for design rows laid out like the training design
    ///
    /// # Errors
    /// Returns error if the row width does not match the parameter count
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(PipelineError::Model(format!(
                "Expected {} design columns, got {}",
                self.coefficients.len(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.params()))
    }

    /// Predicted means with confidence bands for the mean response
    ///
    /// # Errors
    /// Returns error if the row width does not match the parameter count
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_interval(&self, x: &Array2<f64>, confidence: f64) -> Result<Vec<Prediction>> {
        let means = self.predict(x)?;
        let t_crit = t_critical(confidence, self.df_resid as f64);

        Ok(x.rows()
            .into_iter()
            .zip(means.iter())
            .map(|(row, &mean)| {
                let se = row.dot(&self.cov_params.dot(&row)).sqrt();
                Prediction {
                    mean,
                    lower: mean - t_crit * se,
                    upper: mean + t_crit * se,
                }
            })
            .collect())
    }

    /// Human-readable table of fit statistics and coefficients
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write as _;

        let width = self
            .coefficients
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max(10);
        let rule_len = width + 66;
        let heavy = "=".repeat(rule_len);
        let light = "-".repeat(rule_len);

        let mut s = String::new();
        let _ = writeln!(s, "OLS Regression Results");
        let _ = writeln!(s, "{heavy}");
        let _ = writeln!(s, "{:<22}{:>18}   {:<22}{:>12.4}", "Dep. Variable:", self.dependent, "R-squared:", self.r_squared);
        let _ = writeln!(s, "{:<22}{:>18}   {:<22}{:>12.4}", "Model:", "OLS", "Adj. R-squared:", self.adj_r_squared);
        let _ = writeln!(s, "{:<22}{:>18}   {:<22}{:>12.4}", "Method:", "Least Squares", "F-statistic:", self.f_statistic);
        let _ = writeln!(s, "{:<22}{:>18}   {:<22}{:>12.3e}", "No. Observations:", self.n_obs, "Prob (F-statistic):", self.f_p_value);
        let _ = writeln!(s, "{:<22}{:>18}   {:<22}{:>12.2}", "Df Residuals:", self.df_resid, "Log-Likelihood:", self.log_likelihood);
        let _ = writeln!(s, "{:<22}{:>18}   {:<22}{:>12.2}", "Df Model:", self.df_model, "AIC:", self.aic);
        let _ = writeln!(s, "{:<22}{:>18}   {:<22}{:>12.2}", "", "", "BIC:", self.bic);
        let _ = writeln!(s, "{heavy}");
        let _ = writeln!(
            s,
            "{:<width$}{:>11}{:>11}{:>11}{:>11}{:>11}{:>11}",
            "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
        );
        let _ = writeln!(s, "{light}");
        for c in &self.coefficients {
            let _ = writeln!(
                s,
                "{:<width$}{:>11.4}{:>11.4}{:>11.3}{:>11.3}{:>11.3}{:>11.3}",
                c.name, c.estimate, c.std_error, c.t_value, c.p_value, c.ci_lower, c.ci_upper
            );
        }
        let _ = writeln!(s, "{heavy}");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::engineer_features;
    use crate::structs::Column;
    use ndarray::array;

    fn example_features() -> Dataset {
        let raw = Dataset::from_columns(vec![
            Column::float("Stress_Level (1-10)", vec![3.0, 5.0, 7.0, 8.0]),
            Column::float("Sleep_Hours_per_Night", vec![8.0, 7.0, 6.0, 5.0]),
            Column::float("Total_Score", vec![90.0, 85.0, 80.0, 70.0]),
        ])
        .expect("dataset");
        engineer_features(&raw, &StudentSchema::default()).expect("features")
    }

    /// 12 rows with noise so every statistic is defined
    fn noisy_features() -> Dataset {
        let stress = vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 3.0, 5.0, 7.0, 9.0];
        let sleep = vec![8.0, 7.5, 7.0, 6.0, 6.5, 5.0, 5.5, 4.0, 6.0, 8.0, 7.0, 6.0];
        let noise = [0.5, -0.3, 0.8, -0.6, 0.1, 0.4, -0.9, 0.2, -0.4, 0.7, -0.2, 0.3];
        let total = stress
            .iter()
            .zip(&sleep)
            .zip(noise)
            .map(|((s, l), e)| 60.0 - 2.0 * s + 3.0 * l + 0.5 * (s - 5.5) * (l - 6.4) + e)
            .collect();
        let raw = Dataset::from_columns(vec![
            Column::float("Stress_Level (1-10)", stress),
            Column::float("Sleep_Hours_per_Night", sleep),
            Column::float("Total_Score", total),
        ])
        .expect("dataset");
        engineer_features(&raw, &StudentSchema::default()).expect("features")
    }

    #[test]
    fn test_invert() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = invert(&m).expect("invert");
        let identity = m.dot(&inv);

        assert!((identity[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(identity[[0, 1]].abs() < 1e-12);
        assert!((inv[[0, 0]] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_invert_singular() {
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(invert(&m).is_err());
    }

    #[test]
    fn test_exactly_determined_example_fits() {
        let model = build_interaction_regression_model(&example_features(), &StudentSchema::default())
            .expect("fit");

        assert_eq!(model.coefficients.len(), 4);
        assert_eq!(model.df_resid, 0);

        let names: Vec<&str> = model.coefficients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![CONST, STRESS_LEVEL_C, SLEEP_HOURS_C, STRESS_SLEEP_INTERACTION_C]);

        let expected = [81.25, 5.0, 15.0, 0.0];
        for (c, want) in model.coefficients.iter().zip(expected) {
            assert!((c.estimate - want).abs() < 1e-6, "{} = {}", c.name, c.estimate);
            assert!(c.p_value.is_nan());
        }
        assert!(model.residuals.iter().all(|r| r.abs() < 1e-6));
    }

    #[test]
    fn test_recovers_coefficients_with_noise() {
        let model = build_interaction_regression_model(&noisy_features(), &StudentSchema::default())
            .expect("fit");

        assert_eq!(model.n_obs, 12);
        assert_eq!(model.df_resid, 8);
        assert!(model.r_squared > 0.95 && model.r_squared <= 1.0);
        assert!(model.adj_r_squared < model.r_squared);
        assert!(model.f_p_value < 0.001);

        let stress = model.coefficient(STRESS_LEVEL_C).expect("stress");
        assert!((stress.estimate + 2.0).abs() < 0.5);
        assert!(stress.p_value < 0.01);
        assert!(stress.ci_lower < stress.estimate && stress.estimate < stress.ci_upper);

        let residual_sum: f64 = model.residuals.iter().sum();
        assert!(residual_sum.abs() < 1e-8);
        for ((f, r), y) in model
            .fitted_values
            .iter()
            .zip(&model.residuals)
            .zip(noisy_features().numeric_column("Total_Score").expect("y"))
        {
            assert!((f + r - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_too_few_rows() {
        let names: Vec<String> = ["const", "a", "b"].iter().map(ToString::to_string).collect();
        let x = array![[1.0, 1.0, 2.0], [1.0, 2.0, 3.0]];
        let y = array![1.0, 2.0];

        let result = fit_ols(&names, &x, &y, "y");
        assert!(matches!(result, Err(PipelineError::Model(_))));
    }

    #[test]
    fn test_collinear_design_fails() {
        // Constant stress centers to all zeros
        let raw = Dataset::from_columns(vec![
            Column::float("Stress_Level (1-10)", vec![5.0; 6]),
            Column::float("Sleep_Hours_per_Night", vec![8.0, 7.0, 6.0, 5.0, 7.0, 6.0]),
            Column::float("Total_Score", vec![90.0, 85.0, 80.0, 70.0, 88.0, 75.0]),
        ])
        .expect("dataset");
        let features = engineer_features(&raw, &StudentSchema::default()).expect("features");

        let result = build_interaction_regression_model(&features, &StudentSchema::default());
        assert!(matches!(result, Err(PipelineError::Model(msg)) if msg.contains("rank deficient")));
    }

    #[test]
    fn test_missing_predictor_column() {
        let raw = Dataset::from_columns(vec![Column::float("Total_Score", vec![1.0, 2.0])])
            .expect("dataset");
        let result = build_interaction_regression_model(&raw, &StudentSchema::default());
        assert!(matches!(result, Err(PipelineError::MissingColumn(_))));
    }

    #[test]
    fn test_predict_interval_contains_mean() {
        let model = build_interaction_regression_model(&noisy_features(), &StudentSchema::default())
            .expect("fit");
        let rows = array![[1.0, 0.0, 0.0, 0.0], [1.0, 2.0, -1.0, -2.0]];

        let predictions = model.predict_interval(&rows, 0.95).expect("predict");

        assert_eq!(predictions.len(), 2);
        let intercept = model.coefficient(CONST).expect("const").estimate;
        assert!((predictions[0].mean - intercept).abs() < 1e-12);
        for p in predictions {
            assert!(p.lower < p.mean && p.mean < p.upper);
        }
        assert!(model.predict(&array![[1.0, 0.0]]).is_err());
    }

    #[test]
    fn test_vif() {
        let entries = variance_inflation_factors(&noisy_features(), &PREDICTORS).expect("vif");

        let names: Vec<&str> = entries.iter().map(|e| e.feature.as_str()).collect();
        assert_eq!(names, vec![STRESS_LEVEL_C, SLEEP_HOURS_C, STRESS_SLEEP_INTERACTION_C, CONST]);
        assert!(entries.iter().all(|e| e.vif >= 1.0));
    }

    #[test]
    fn test_summary_lists_parameters() {
        let model = build_interaction_regression_model(&noisy_features(), &StudentSchema::default())
            .expect("fit");
        let summary = model.summary();

        assert!(summary.contains("OLS Regression Results"));
        assert!(summary.contains("Total_Score"));
        assert!(summary.contains("R-squared:"));
        assert!(summary.contains("F-statistic:"));
        for name in PREDICTORS {
            assert!(summary.contains(name));
        }
    }
}
