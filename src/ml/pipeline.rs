//! Analysis pipeline that orchestrates every stage after ingestion

use crate::ml::analysis::{compute_correlations, extract_model_effects};
use crate::ml::cleaning::clean_full_dataset;
use crate::ml::clustering::kmeans;
use crate::ml::features::engineer_features;
use crate::ml::reduction::run_pca;
use crate::ml::regression::{
    build_interaction_regression_model, variance_inflation_factors, PREDICTORS,
};
use crate::schema::StudentSchema;
use crate::structs::{AnalysisResult, ColumnStats, Dataset, FeatureMatrix, Result};
use tracing::{debug, info};

/// Configuration for the analysis pipeline
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub clusters: usize,
    pub pca_components: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            clusters: 3,
            pca_components: 2,
        }
    }
}

/// Descriptive statistics of every numeric column
#[must_use]
pub fn numeric_column_stats(dataset: &Dataset) -> Vec<ColumnStats> {
    dataset
        .columns()
        .iter()
        .filter(|c| c.is_numeric())
        .filter_map(|c| ColumnStats::calculate(&c.name, &c.numeric_values()).ok())
        .collect()
}

/// Run clean, engineer, analyze and model on a raw dataset
///
/// # Errors
/// Returns error if a required column is absent before or after cleaning,
/// or if correlation, PCA, clustering or model fitting fails.
pub fn run_pipeline(
    raw: &Dataset,
    schema: &StudentSchema,
    config: &AnalysisConfig,
) -> Result<AnalysisResult> {
    schema.require(raw)?;

    let (cleaned, cleaning) = clean_full_dataset(raw, schema);
    // Cleaning may drop a sparse required column
    schema.require(&cleaned)?;

    let features = engineer_features(&cleaned, schema)?;

    let column_stats = numeric_column_stats(&features);
    for stats in &column_stats {
        debug!("{}", stats.summary());
    }

    let correlations = compute_correlations(&features, schema)?;

    let matrix = FeatureMatrix::from_dataset(&features)?;
    let pca = run_pca(&matrix, config.pca_components)?;
    let clusters = kmeans(&pca.to_features(), config.clusters)?;
    debug!("{}", clusters.summary().trim_end());

    let model = build_interaction_regression_model(&features, schema)?;
    let effects = extract_model_effects(&model);
    for (name, effect) in effects.entries() {
        match (effect.coef, effect.p_value) {
            (Some(coef), Some(p)) => info!("{name}: coef={coef:.4}, p={p:.4e}"),
            _ => info!("{name}: not in model"),
        }
    }
    info!("Model summary:\n{}", model.summary());

    let vif = variance_inflation_factors(&features, &PREDICTORS)?;

    Ok(AnalysisResult {
        raw_shape: raw.shape(),
        cleaning,
        features,
        column_stats,
        correlations,
        pca,
        clusters,
        model,
        effects,
        vif,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::structs::{Column, PipelineError, TypeInference};

    /// Small raw (all-text) student table used across the output tests
    pub(crate) fn raw_students() -> Dataset {
        let rows: [[&str; 6]; 10] = [
            ["S1", "3", "8.0", "90", "95", "2024-01-05"],
            ["S2", "5", "7.0", "85", "NA", "2024-01-06"],
            ["S3", "7", "6.0", "80", "70", "2024-01-07"],
            ["S4", "8", "5.0", "70", "60", "2024-01-08"],
            ["S5", "2", "7.5", "88", "98", ""],
            ["S6", "9", "4.5", "60", "55", "2024-01-10"],
            ["S7", "4", "6.5", "82", "85", "2024-01-11"],
            ["S8", "6", "8.5", "78", "?", "2024-01-12"],
            ["S9", "10", "5.5", "65", "50", "2024-01-13"],
            ["S10", "1", "9.0", "95", "99", "2024-01-14"],
        ];
        let headers = [
            "Student_ID",
            "Stress_Level (1-10)",
            "Sleep_Hours_per_Night",
            "Total_Score",
            "Attendance (%)",
            "Enrolled",
        ];

        Dataset::from_columns(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| Column::text(*h, rows.iter().map(|r| r[i].to_string()).collect()))
                .collect(),
        )
        .expect("raw dataset")
    }

    #[test]
    fn test_full_pipeline() {
        let raw = raw_students();
        let result = run_pipeline(&raw, &StudentSchema::default(), &AnalysisConfig::default())
            .expect("pipeline");

        assert_eq!(result.raw_shape, (10, 6));
        // Cleaning and feature engineering keep every row
        assert_eq!(result.features.row_count(), 10);
        assert!(result.features.has_column("Stress_Sleep_Interaction_c"));
        assert!(!result.column_stats.is_empty());

        assert_eq!(result.pca.scores.len(), 10);
        assert_eq!(result.clusters.labels.len(), 10);
        assert!(result.clusters.labels.iter().all(|&l| l < 3));
        assert_eq!(result.clusters.sizes.iter().sum::<usize>(), 10);

        assert_eq!(result.model.coefficients.len(), 4);
        assert_eq!(result.vif.len(), 4);
        assert!(result.effects.beta_interaction.coef.is_some());
        assert!(result.correlations.stress_total.corr < 0.0);
    }

    #[test]
    fn test_pipeline_records_cleaning() {
        let raw = raw_students();
        let result = run_pipeline(&raw, &StudentSchema::default(), &AnalysisConfig::default())
            .expect("pipeline");

        let attendance = result
            .cleaning
            .imputed
            .iter()
            .find(|c| c.column == "Attendance (%)")
            .expect("attendance imputed");
        assert_eq!(attendance.filled, 2);
        assert!(result.cleaning.tokens_replaced >= 3);

        let inference_for = |column: &str| {
            result
                .cleaning
                .inferences
                .iter()
                .find(|i| i.column == column)
                .map(|i| i.inference.clone())
        };
        assert_eq!(
            inference_for("Enrolled"),
            Some(TypeInference::Timestamp { coerced: 0 })
        );
        assert_eq!(inference_for("Student_ID"), Some(TypeInference::Text));
    }

    #[test]
    fn test_pipeline_rejects_missing_required_column() {
        let mut raw = raw_students();
        raw.drop_column("Sleep_Hours_per_Night");

        let result = run_pipeline(&raw, &StudentSchema::default(), &AnalysisConfig::default());

        match result {
            Err(PipelineError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["Sleep_Hours_per_Night".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_rejects_too_many_clusters() {
        let config = AnalysisConfig {
            clusters: 50,
            pca_components: 2,
        };
        let result = run_pipeline(&raw_students(), &StudentSchema::default(), &config);

        assert!(matches!(result, Err(PipelineError::Ml(_))));
    }
}
