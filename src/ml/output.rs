//! Report writers for a finished analysis

use crate::structs::{
    AnalysisResult, CleaningReport, ClusterResult, Coefficient, ColumnStats, CorrelationMatrix,
    CorrelationReport, FittedModel, ModelEffects, PcaResult, Result, VifEntry,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Build `summary.txt` - human readable overview of the run
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn build_summary(data_path: &Path, result: &AnalysisResult) -> String {
    let mut s = String::new();
    let (raw_rows, raw_cols) = result.raw_shape;
    let (rows, cols) = result.features.shape();

    let _ = writeln!(s, "Student Stress, Sleep and Performance Analysis");
    let _ = writeln!(s, "==============================================");
    let _ = writeln!(s, "Source: {}", data_path.display());
    let _ = writeln!(s, "Raw shape: {raw_rows} rows x {raw_cols} columns");
    let _ = writeln!(s, "Analyzed shape: {rows} rows x {cols} columns");
    s.push('\n');

    write_cleaning_section(&mut s, &result.cleaning);

    let _ = writeln!(s, "Correlations (Pearson)");
    let _ = writeln!(s, "----------------------");
    for (name, entry) in result.correlations.entries() {
        let _ = writeln!(s, "{name}: r={:.4}, p={:.4e}", entry.corr, entry.p_value);
    }
    s.push('\n');

    let _ = writeln!(s, "Model effects");
    let _ = writeln!(s, "-------------");
    for (name, effect) in result.effects.entries() {
        match (effect.coef, effect.p_value) {
            (Some(coef), Some(p)) => {
                let _ = writeln!(s, "{name}: coef={coef:.4}, p={p:.4e}");
            }
            _ => {
                let _ = writeln!(s, "{name}: not in model");
            }
        }
    }
    s.push('\n');

    let _ = writeln!(s, "Variance inflation factors");
    let _ = writeln!(s, "--------------------------");
    for entry in &result.vif {
        let _ = writeln!(s, "{}: {:.3}", entry.feature, entry.vif);
    }
    s.push('\n');

    let _ = writeln!(s, "PCA");
    let _ = writeln!(s, "---");
    for (i, (ratio, cumulative)) in result
        .pca
        .explained_variance_ratio
        .iter()
        .zip(&result.pca.cumulative_variance)
        .enumerate()
    {
        let _ = writeln!(
            s,
            "PC{}: {:.1}% of variance (cumulative {:.1}%)",
            i + 1,
            ratio * 100.0,
            cumulative * 100.0
        );
    }
    s.push('\n');

    s.push_str(&result.clusters.summary());
    s.push('\n');

    s.push_str(&result.model.summary());
    s
}

fn write_cleaning_section(s: &mut String, cleaning: &CleaningReport) {
    let _ = writeln!(s, "Cleaning");
    let _ = writeln!(s, "--------");
    let _ = writeln!(s, "Missing tokens replaced: {}", cleaning.tokens_replaced);

    if cleaning.dropped_columns.is_empty() {
        let _ = writeln!(s, "Dropped columns (>50% missing): none");
    } else {
        let _ = writeln!(
            s,
            "Dropped columns (>50% missing): {}",
            cleaning.dropped_columns.join(", ")
        );
    }

    for imputed in &cleaning.imputed {
        let _ = writeln!(
            s,
            "Imputed {}: {} values filled with {}",
            imputed.column, imputed.filled, imputed.fill_value
        );
    }
    for violation in &cleaning.range_violations {
        let _ = writeln!(
            s,
            "Invalid {} values: {}",
            violation.label, violation.count
        );
    }
    for outlier in cleaning.outliers.iter().filter(|o| o.count > 0) {
        let _ = writeln!(
            s,
            "Outliers in {}: {} outside [{:.2}, {:.2}]",
            outlier.column, outlier.count, outlier.lower, outlier.upper
        );
    }
    s.push('\n');
}

/// Write `summary.txt`
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_summary(output_dir: &Path, content: &str) -> Result<()> {
    let path = output_dir.join("summary.txt");
    fs::write(path, content)?;
    Ok(())
}

/// Write `clusters.csv` - cluster assignment and centroid distance for each row
///
/// Distances are measured in the PCA space the clusters were fitted in.
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_clusters(output_dir: &Path, pca: &PcaResult, clusters: &ClusterResult) -> Result<()> {
    let path = output_dir.join("clusters.csv");
    let mut content = String::from("row_id,cluster,distance_to_centroid\n");

    for (sample_idx, &cluster_id) in clusters.labels.iter().enumerate() {
        let original_row = pca.row_indices[sample_idx];
        let distance = clusters
            .centroids
            .get(cluster_id)
            .map_or(f64::NAN, |c| euclidean_distance(&pca.scores[sample_idx], c));
        let _ = writeln!(content, "{original_row},{cluster_id},{distance:.4}");
    }

    fs::write(path, content)?;
    Ok(())
}

/// Write a correlation matrix as CSV with a leading name column
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_correlation(path: &Path, corr: &CorrelationMatrix) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![String::new()];
    header.extend(corr.names.iter().cloned());
    writer.write_record(&header)?;

    for (name, row) in corr.names.iter().zip(&corr.matrix) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| format!("{v:.4}")));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write `stats.json` - machine-readable statistics
///
/// Undefined statistics (NaN) are written as `null`.
///
/// # Errors
/// Returns error if file cannot be written
#[allow(clippy::cast_precision_loss)]
pub fn write_stats_json(output_dir: &Path, result: &AnalysisResult) -> Result<()> {
    let path = output_dir.join("stats.json");
    let n_clustered = result.clusters.labels.len().max(1);

    let cluster_summary: Vec<_> = result
        .clusters
        .sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| ClusterEntry {
            id: i,
            size,
            percentage: (size as f64 / n_clustered as f64) * 100.0,
        })
        .collect();

    let output = StatsOutput {
        raw_shape: result.raw_shape,
        row_count: result.features.row_count(),
        column_count: result.features.col_count(),
        columns: result.features.names(),
        statistics: &result.column_stats,
        cleaning: &result.cleaning,
        correlations: &result.correlations,
        effects: &result.effects,
        model: ModelFit::from(&result.model),
        vif: &result.vif,
        pca: PcaSummary {
            n_components: result.pca.n_components,
            explained_variance_ratio: &result.pca.explained_variance_ratio,
            cumulative_variance: &result.pca.cumulative_variance,
        },
        clustering: ClusteringSummary {
            k: result.clusters.k,
            clusters: cluster_summary,
        },
    };

    let json = serde_json::to_string_pretty(&output)?;
    fs::write(path, json)?;
    Ok(())
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

// JSON output structures

#[derive(Serialize)]
struct StatsOutput<'a> {
    raw_shape: (usize, usize),
    row_count: usize,
    column_count: usize,
    columns: Vec<&'a str>,
    statistics: &'a [ColumnStats],
    cleaning: &'a CleaningReport,
    correlations: &'a CorrelationReport,
    effects: &'a ModelEffects,
    model: ModelFit<'a>,
    vif: &'a [VifEntry],
    pca: PcaSummary<'a>,
    clustering: ClusteringSummary,
}

#[derive(Serialize)]
struct ModelFit<'a> {
    dependent: &'a str,
    n_obs: usize,
    df_model: usize,
    df_resid: usize,
    r_squared: f64,
    adj_r_squared: f64,
    f_statistic: f64,
    f_p_value: f64,
    log_likelihood: f64,
    aic: f64,
    bic: f64,
    coefficients: &'a [Coefficient],
}

impl<'a> From<&'a FittedModel> for ModelFit<'a> {
    fn from(model: &'a FittedModel) -> Self {
        Self {
            dependent: &model.dependent,
            n_obs: model.n_obs,
            df_model: model.df_model,
            df_resid: model.df_resid,
            r_squared: model.r_squared,
            adj_r_squared: model.adj_r_squared,
            f_statistic: model.f_statistic,
            f_p_value: model.f_p_value,
            log_likelihood: model.log_likelihood,
            aic: model.aic,
            bic: model.bic,
            coefficients: &model.coefficients,
        }
    }
}

#[derive(Serialize)]
struct PcaSummary<'a> {
    n_components: usize,
    explained_variance_ratio: &'a [f64],
    cumulative_variance: &'a [f64],
}

#[derive(Serialize)]
struct ClusteringSummary {
    k: usize,
    clusters: Vec<ClusterEntry>,
}

#[derive(Serialize)]
struct ClusterEntry {
    id: usize,
    size: usize,
    percentage: f64,
}
