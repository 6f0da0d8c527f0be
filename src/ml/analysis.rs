//! Headline correlations and model effects

use crate::ml::features::{SLEEP_HOURS_C, STRESS_LEVEL_C, STRESS_SLEEP_INTERACTION_C};
use crate::ml::stats::pearson;
use crate::schema::StudentSchema;
use crate::structs::{
    CorrelationEntry, CorrelationReport, Dataset, Effect, FittedModel, ModelEffects,
    PipelineError, Result,
};
use tracing::info;

fn pair(dataset: &Dataset, x: &str, y: &str) -> Result<CorrelationEntry> {
    let xs = dataset.numeric_column(x)?;
    let ys = dataset.numeric_column(y)?;
    pearson(&xs, &ys).map_err(|e| PipelineError::Stats(format!("{x} vs {y}: {e}")))
}

/// Pearson correlations between centered stress, centered sleep and the target
///
/// # Errors
/// Returns error if a column is absent, has fewer than 2 values, or is constant
pub fn compute_correlations(dataset: &Dataset, schema: &StudentSchema) -> Result<CorrelationReport> {
    info!("Computing Pearson correlations");

    let report = CorrelationReport {
        stress_total: pair(dataset, STRESS_LEVEL_C, &schema.target)?,
        sleep_total: pair(dataset, SLEEP_HOURS_C, &schema.target)?,
        stress_sleep: pair(dataset, STRESS_LEVEL_C, SLEEP_HOURS_C)?,
    };

    for (name, entry) in report.entries() {
        info!("Correlation {name}: r={:.4}, p={:.4e}", entry.corr, entry.p_value);
    }
    Ok(report)
}

fn effect(model: &FittedModel, name: &str) -> Effect {
    model
        .coefficient(name)
        .map(|c| Effect {
            coef: Some(c.estimate),
            p_value: Some(c.p_value),
        })
        .unwrap_or_default()
}

/// Coefficient and p-value of each engineered predictor
///
/// Predictors absent from the model are reported with `None` values.
#[must_use]
pub fn extract_model_effects(model: &FittedModel) -> ModelEffects {
    info!("Extracting model coefficients and p-values");

    ModelEffects {
        beta_stress: effect(model, STRESS_LEVEL_C),
        beta_sleep: effect(model, SLEEP_HOURS_C),
        beta_interaction: effect(model, STRESS_SLEEP_INTERACTION_C),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::engineer_features;
    use crate::ml::regression::{build_interaction_regression_model, fit_ols};
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

    #[test]
    fn test_example_correlations() {
        let report = compute_correlations(&example_features(), &StudentSchema::default())
            .expect("correlations");

        // Stress rises while the score falls
        assert!(report.stress_total.corr < -0.9);
        assert!(report.sleep_total.corr > 0.9);
        assert!(report.stress_sleep.corr < -0.9);

        for (_, entry) in report.entries() {
            assert!((-1.0..=1.0).contains(&entry.corr));
            assert!((0.0..=1.0).contains(&entry.p_value));
        }
    }

    #[test]
    fn test_constant_column_fails() {
        let mut features = example_features();
        features
            .set_column(Column::float("Total_Score", vec![50.0; 4]))
            .expect("replace");

        let result = compute_correlations(&features, &StudentSchema::default());
        assert!(matches!(result, Err(PipelineError::Stats(_))));
    }

    #[test]
    fn test_missing_centered_column_fails() {
        let mut features = example_features();
        features.drop_column(SLEEP_HOURS_C);

        let result = compute_correlations(&features, &StudentSchema::default());
        assert!(matches!(result, Err(PipelineError::MissingColumn(_))));
    }

    #[test]
    fn test_effects_of_example_model() {
        let model = build_interaction_regression_model(&example_features(), &StudentSchema::default())
            .expect("fit");
        let effects = extract_model_effects(&model);

        let names: Vec<&str> = effects.entries().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["beta_stress", "beta_sleep", "beta_interaction"]);
        assert!((effects.beta_stress.coef.expect("stress coef") - 5.0).abs() < 1e-6);
        assert!(effects.entries().iter().all(|(_, e)| e.coef.is_some()));
    }

    #[test]
    fn test_absent_predictor_reported_as_none() {
        let names = vec!["const".to_string(), STRESS_LEVEL_C.to_string()];
        let x = array![[1.0, -1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![1.0, 2.0, 3.5];
        let model = fit_ols(&names, &x, &y, "Total_Score").expect("fit");

        let effects = extract_model_effects(&model);

        assert!(effects.beta_stress.coef.is_some());
        assert_eq!(effects.beta_sleep, Effect::default());
        assert_eq!(effects.beta_interaction.p_value, None);

        let json = serde_json::to_value(&effects).expect("serialize");
        assert!(json["beta_sleep"]["coef"].is_null());
    }
}
