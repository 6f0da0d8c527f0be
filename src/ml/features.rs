use crate::ml::stats::mean;
use crate::schema::StudentSchema;
use crate::structs::{Column, Dataset, FeatureMatrix, PipelineError, Result};
use tracing::info;

pub const STRESS_SLEEP_INTERACTION: &str = "Stress_Sleep_Interaction";
pub const STRESS_LEVEL_C: &str = "Stress_Level_c";
pub const SLEEP_HOURS_C: &str = "Sleep_Hours_c";
pub const STRESS_SLEEP_INTERACTION_C: &str = "Stress_Sleep_Interaction_c";

/// Subtract the sample mean from every value
#[must_use]
pub fn center(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    values.iter().map(|v| v - m).collect()
}

fn product(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

/// Add the raw (uncentered) stress x sleep product
///
/// # Errors
/// Returns error if either source column is absent, non-numeric or has gaps
pub fn add_interaction_term(dataset: &Dataset, schema: &StudentSchema) -> Result<Dataset> {
    info!(
        "Adding interaction term: {} * {}",
        schema.stress, schema.sleep
    );
    let stress = dataset.numeric_column(&schema.stress)?;
    let sleep = dataset.numeric_column(&schema.sleep)?;

    let mut out = dataset.clone();
    out.set_column(Column::float(
        STRESS_SLEEP_INTERACTION,
        product(&stress, &sleep),
    ))?;
    Ok(out)
}

/// Add mean-centered stress and sleep plus the product of the centered terms
///
/// # Errors
/// Returns error if either source column is absent, non-numeric or has gaps
pub fn add_centered_variables(dataset: &Dataset, schema: &StudentSchema) -> Result<Dataset> {
    info!("Centering stress and sleep variables");
    let stress_c = center(&dataset.numeric_column(&schema.stress)?);
    let sleep_c = center(&dataset.numeric_column(&schema.sleep)?);
    let interaction_c = product(&stress_c, &sleep_c);

    let mut out = dataset.clone();
    out.set_column(Column::float(STRESS_LEVEL_C, stress_c))?;
    out.set_column(Column::float(SLEEP_HOURS_C, sleep_c))?;
    out.set_column(Column::float(STRESS_SLEEP_INTERACTION_C, interaction_c))?;
    Ok(out)
}

/// Derive the interaction and centered predictors from a cleaned dataset
///
/// # Errors
/// Returns error if the stress or sleep column is unusable
pub fn engineer_features(dataset: &Dataset, schema: &StudentSchema) -> Result<Dataset> {
    let with_interaction = add_interaction_term(dataset, schema)?;
    let engineered = add_centered_variables(&with_interaction, schema)?;
    info!(
        "Feature engineering completed with columns: {:?}",
        engineered.names()
    );
    Ok(engineered)
}

impl FeatureMatrix {
    /// Extract every numeric column of a dataset
    ///
    /// Rows with a gap in any numeric column are skipped; `row_indices`
    /// maps the kept rows back to the dataset.
    ///
    /// # Errors
    /// Returns error if no numeric columns or no complete rows are found
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let numeric_cols: Vec<_> = dataset
            .columns()
            .iter()
            .filter(|c| c.is_numeric())
            .collect();

        if numeric_cols.is_empty() {
            return Err(PipelineError::Ml("No numeric columns found".into()));
        }

        let names: Vec<String> = numeric_cols.iter().map(|c| c.name.clone()).collect();

        let mut data = Vec::new();
        let mut row_indices = Vec::new();

        for row_idx in 0..dataset.row_count() {
            let features: Option<Vec<f64>> = numeric_cols
                .iter()
                .map(|c| c.values[row_idx].as_f64().filter(|v| v.is_finite()))
                .collect();

            if let Some(features) = features {
                data.push(features);
                row_indices.push(row_idx);
            }
        }

        if data.is_empty() {
            return Err(PipelineError::Ml("No complete rows with numeric data".into()));
        }

        Ok(Self {
            names,
            data,
            row_indices,
        })
    }
}
