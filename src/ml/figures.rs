//! Plot-ready data series written as CSV
//!
//! Each file holds exactly the numbers a chart of the same name would draw.

use crate::ml::correlation::{correlation_matrix, select_features};
use crate::ml::features::{SLEEP_HOURS_C, STRESS_LEVEL_C, STRESS_SLEEP_INTERACTION_C};
use crate::ml::output::write_correlation;
use crate::ml::regression::{CONFIDENCE, CONST};
use crate::ml::stats::{percentile, sorted};
use crate::schema::StudentSchema;
use crate::structs::{AnalysisResult, FeatureMatrix, PipelineError, Result};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tracing::info;

/// Points along the stress axis of the interaction plot
pub const GRID_POINTS: usize = 50;

/// Sleep percentiles at which the interaction lines are drawn
pub const SLEEP_LEVELS: [(&str, f64); 3] = [("p25", 25.0), ("p50", 50.0), ("p75", 75.0)];

/// One histogram bin; the last bin of a series is closed on both ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Number of histogram bins by Sturges' rule
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn sturges_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    (n as f64).log2().ceil() as usize + 1
}

/// Equal-width histogram over `[min, max]`
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return vec![Bin {
            lower: min,
            upper: max,
            count: finite.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut result: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for v in finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        result[idx].count += 1;
    }
    result
}

fn write_histograms(path: &Path, features: &FeatureMatrix) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["variable", "bin_lower", "bin_upper", "count"])?;

    for (i, name) in features.names.iter().enumerate() {
        let values = features.column(i).unwrap_or_default();
        for bin in histogram(&values, sturges_bins(values.len())) {
            writer.write_record([
                name.clone(),
                format!("{:.4}", bin.lower),
                format!("{:.4}", bin.upper),
                bin.count.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Stress and sleep distributions
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_stress_sleep_distributions(
    path: &Path,
    features: &FeatureMatrix,
    schema: &StudentSchema,
) -> Result<()> {
    let selected = select_features(features, &[schema.stress.as_str(), schema.sleep.as_str()]);
    write_histograms(path, &selected)
}

/// Distributions of each score component present
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_score_component_distributions(
    path: &Path,
    features: &FeatureMatrix,
    components: &[&str],
) -> Result<()> {
    let selected = select_features(features, components);
    write_histograms(path, &selected)
}

/// Principal component scores with the cluster of each row
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_pca_clusters(path: &Path, result: &AnalysisResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["row_id".to_string()];
    header.extend((1..=result.pca.n_components).map(|i| format!("PC{i}")));
    header.push("cluster".to_string());
    writer.write_record(&header)?;

    for ((row_id, scores), label) in result
        .pca
        .row_indices
        .iter()
        .zip(&result.pca.scores)
        .zip(&result.clusters.labels)
    {
        let mut record = vec![row_id.to_string()];
        record.extend(scores.iter().map(|v| format!("{v:.6}")));
        record.push(label.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Evenly spaced values from `start` to `end` inclusive
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Design rows for centered stress/sleep pairs, ordered like the model's coefficients
///
/// # Errors
/// Returns error if the model has a coefficient outside the interaction design
pub fn interaction_design(names: &[&str], points: &[(f64, f64)]) -> Result<Array2<f64>> {
    let mut x = Array2::zeros((points.len(), names.len()));
    for (j, name) in names.iter().enumerate() {
        for (i, &(stress, sleep)) in points.iter().enumerate() {
            x[[i, j]] = match *name {
                CONST => 1.0,
                STRESS_LEVEL_C => stress,
                SLEEP_HOURS_C => sleep,
                STRESS_SLEEP_INTERACTION_C => stress * sleep,
                other => {
                    return Err(PipelineError::Model(format!(
                        "Unexpected design column {other}"
                    )))
                }
            };
        }
    }
    Ok(x)
}

/// Predicted score over the stress range at low, median and high sleep
///
/// # Errors
/// Returns error if the centered columns are absent or the file cannot be written
pub fn write_interaction_effect(path: &Path, result: &AnalysisResult) -> Result<()> {
    let stress = result.features.numeric_column(STRESS_LEVEL_C)?;
    let sleep = sorted(&result.features.numeric_column(SLEEP_HOURS_C)?);

    let s_min = stress.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = stress.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let grid = linspace(s_min, s_max, GRID_POINTS);

    let names: Vec<&str> = result
        .model
        .coefficients
        .iter()
        .map(|c| c.name.as_str())
        .collect();

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "sleep_level",
        SLEEP_HOURS_C,
        STRESS_LEVEL_C,
        "predicted",
        "lower",
        "upper",
    ])?;

    for (label, p) in SLEEP_LEVELS {
        let level = percentile(&sleep, p);
        let points: Vec<(f64, f64)> = grid.iter().map(|&s| (s, level)).collect();
        let x = interaction_design(&names, &points)?;
        let predictions = result.model.predict_interval(&x, CONFIDENCE)?;

        for (&(s, _), pred) in points.iter().zip(&predictions) {
            writer.write_record([
                label.to_string(),
                format!("{level:.4}"),
                format!("{s:.4}"),
                format!("{:.4}", pred.mean),
                format!("{:.4}", pred.lower),
                format!("{:.4}", pred.upper),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Fitted values against residuals
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_regression_diagnostics(path: &Path, result: &AnalysisResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["row_id", "fitted", "residual"])?;

    for (i, (fitted, resid)) in result
        .model
        .fitted_values
        .iter()
        .zip(&result.model.residuals)
        .enumerate()
    {
        writer.write_record([i.to_string(), format!("{fitted:.6}"), format!("{resid:.6}")])?;
    }

    writer.flush()?;
    Ok(())
}

/// # Errors
/// Returns error if the file cannot be written
pub fn write_vif(path: &Path, result: &AnalysisResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["feature", "vif"])?;
    for entry in &result.vif {
        writer.write_record([entry.feature.clone(), format!("{:.4}", entry.vif)])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every figure data file into `output_dir`, returning the written paths
///
/// # Errors
/// Returns error if any file cannot be written
pub fn write_all_figures(
    output_dir: &Path,
    result: &AnalysisResult,
    schema: &StudentSchema,
) -> Result<Vec<PathBuf>> {
    let matrix = FeatureMatrix::from_dataset(&result.features)?;
    let components = schema.present_components(&result.features);
    let mut written = Vec::new();

    let path = output_dir.join("stress_sleep_distributions.csv");
    write_stress_sleep_distributions(&path, &matrix, schema)?;
    written.push(path);

    let path = output_dir.join("score_component_distributions.csv");
    write_score_component_distributions(&path, &matrix, &components)?;
    written.push(path);

    let path = output_dir.join("score_components_corr.csv");
    write_correlation(&path, &correlation_matrix(&select_features(&matrix, &components)))?;
    written.push(path);

    let path = output_dir.join("eda_correlation.csv");
    write_correlation(&path, &correlation_matrix(&matrix))?;
    written.push(path);

    let path = output_dir.join("eda_pca_kmeans.csv");
    write_pca_clusters(&path, result)?;
    written.push(path);

    let path = output_dir.join("interaction_effect.csv");
    write_interaction_effect(&path, result)?;
    written.push(path);

    let path = output_dir.join("regression_diagnostics.csv");
    write_regression_diagnostics(&path, result)?;
    written.push(path);

    let path = output_dir.join("vif.csv");
    write_vif(&path, result)?;
    written.push(path);

    for path in &written {
        info!("Saved figure data to {}", path.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::pipeline::tests::raw_students;
    use crate::ml::pipeline::{run_pipeline, AnalysisConfig};
    use std::fs;
    use tempfile::TempDir;

    fn analysis() -> AnalysisResult {
        run_pipeline(
            &raw_students(),
            &StudentSchema::default(),
            &AnalysisConfig::default(),
        )
        .expect("pipeline")
    }

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        csv::Reader::from_path(path)
            .expect("open csv")
            .records()
            .collect::<std::result::Result<_, _>>()
            .expect("read records")
    }

    #[test]
    fn test_sturges_bins() {
        assert_eq!(sturges_bins(1), 1);
        assert_eq!(sturges_bins(8), 4);
        assert_eq!(sturges_bins(10), 5);
        assert_eq!(sturges_bins(1000), 11);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [1.0, 2.0, 2.5, 3.0, 4.0, 10.0];
        let bins = histogram(&values, 3);

        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 6);
        assert!((bins[0].lower - 1.0).abs() < 1e-12);
        assert!((bins[2].upper - 10.0).abs() < 1e-12);
        // Max lands in the closed last bin
        assert_eq!(bins[2].count, 1);
        assert_eq!(bins[0].count, 4);
    }

    #[test]
    fn test_histogram_constant_values() {
        let bins = histogram(&[4.0, 4.0, 4.0], 2);
        assert_eq!(
            bins,
            vec![Bin {
                lower: 4.0,
                upper: 4.0,
                count: 3
            }]
        );
        assert!(histogram(&[], 3).is_empty());
    }

    #[test]
    fn test_linspace() {
        let grid = linspace(-2.0, 2.0, 5);
        assert_eq!(grid, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
    }

    #[test]
    fn test_interaction_design_follows_coefficient_order() {
        let names = [CONST, STRESS_LEVEL_C, SLEEP_HOURS_C, STRESS_SLEEP_INTERACTION_C];
        let x = interaction_design(&names, &[(2.0, -0.5)]).expect("design");

        assert_eq!(x.row(0).to_vec(), vec![1.0, 2.0, -0.5, -1.0]);
        assert!(interaction_design(&["Attendance (%)"], &[(1.0, 1.0)]).is_err());
    }

    #[test]
    fn test_write_all_figures() {
        let dir = TempDir::new().expect("create temp dir");
        let result = analysis();

        let written =
            write_all_figures(dir.path(), &result, &StudentSchema::default()).expect("figures");

        assert_eq!(written.len(), 8);
        assert!(written.iter().all(|p| p.exists()));

        // 3 sleep levels x 50 grid points
        let interaction = read_rows(&dir.path().join("interaction_effect.csv"));
        assert_eq!(interaction.len(), 3 * GRID_POINTS);
        for row in &interaction {
            let mean: f64 = row[3].parse().expect("mean");
            let lower: f64 = row[4].parse().expect("lower");
            let upper: f64 = row[5].parse().expect("upper");
            assert!(lower <= mean && mean <= upper);
        }

        let pca = read_rows(&dir.path().join("eda_pca_kmeans.csv"));
        assert_eq!(pca.len(), 10);
        assert_eq!(pca[0].len(), 4);

        let diagnostics = read_rows(&dir.path().join("regression_diagnostics.csv"));
        assert_eq!(diagnostics.len(), 10);

        let distributions = fs::read_to_string(dir.path().join("stress_sleep_distributions.csv"))
            .expect("read distributions");
        assert!(distributions.contains("Stress_Level (1-10)"));
        assert!(distributions.contains("Sleep_Hours_per_Night"));
    }
}
