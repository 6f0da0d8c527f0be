//! Consolidated public types for the sleepscore crate
//!
//! This module contains the dataset model, cleaning diagnostics and the result
//! types produced by the analysis stages.

use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::Serialize;
use std::fmt;

pub use crate::error::{PipelineError, Result};

// ============================================================================
// Dataset Types
// ============================================================================

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Missing,
}

impl Value {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Numeric view of the value, `None` for non-numeric or missing cells
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Self::Missing => Ok(()),
        }
    }
}

/// Inferred type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Timestamp,
}

impl ColumnType {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// A named, typed column of values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Build an untyped column from raw strings
    #[must_use]
    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(
            name,
            ColumnType::Text,
            values.into_iter().map(Value::Text).collect(),
        )
    }

    /// Build a float column
    #[must_use]
    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(
            name,
            ColumnType::Float,
            values.into_iter().map(Value::Float).collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.kind.is_numeric()
    }

    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    /// Fraction of missing cells, 0.0 for an empty column
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn missing_ratio(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.missing_count() as f64 / self.values.len() as f64
    }

    /// Non-missing numeric values, in row order
    #[must_use]
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }

    /// Dense numeric view of the column
    ///
    /// # Errors
    /// Returns error if the column is not numeric or still has gaps
    pub fn to_f64(&self) -> Result<Vec<f64>> {
        if !self.is_numeric() {
            return Err(PipelineError::InvalidColumn {
                column: self.name.clone(),
                reason: "expected a numeric column".into(),
            });
        }
        self.values
            .iter()
            .map(|v| {
                v.as_f64().ok_or_else(|| PipelineError::InvalidColumn {
                    column: self.name.clone(),
                    reason: "contains missing values".into(),
                })
            })
            .collect()
    }
}

/// In-memory tabular dataset, stored column-major
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from columns of equal length
    ///
    /// # Errors
    /// Returns error if column lengths differ
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(PipelineError::InvalidColumn {
                column: bad.name.clone(),
                reason: format!("has {} rows, expected {n_rows}", bad.len()),
            });
        }
        Ok(Self { columns, n_rows })
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Look up a column, failing with `MissingColumn`
    ///
    /// # Errors
    /// Returns error if the column is absent
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Dense numeric values of a named column
    ///
    /// # Errors
    /// Returns error if the column is absent, not numeric, or has gaps
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        self.require_column(name)?.to_f64()
    }

    /// Insert a column, replacing any existing column with the same name
    ///
    /// # Errors
    /// Returns error if the column length does not match the row count
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if self.columns.is_empty() {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            return Err(PipelineError::InvalidColumn {
                column: column.name.clone(),
                reason: format!("has {} rows, expected {}", column.len(), self.n_rows),
            });
        }

        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Remove a column by name, returning whether it existed
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.columns.len() != before
    }
}

// ============================================================================
// Cleaning Types
// ============================================================================

/// Outcome of type inference for one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TypeInference {
    /// Column already carried a non-text type
    AlreadyTyped { kind: ColumnType },
    /// Every non-missing value parsed as a number
    Numeric { kind: ColumnType },
    /// Date pattern matched; `coerced` values failed to parse and became missing
    Timestamp { coerced: usize },
    /// Fallback, column kept as text
    Text,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInference {
    pub column: String,
    pub inference: TypeInference,
}

/// Count of rows outside a domain range rule
#[derive(Debug, Clone, Serialize)]
pub struct RangeViolation {
    pub column: String,
    pub label: String,
    pub count: usize,
}

/// Count of IQR outliers in a numeric column
#[derive(Debug, Clone, Serialize)]
pub struct OutlierCount {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImputedColumn {
    pub column: String,
    pub filled: usize,
    pub fill_value: String,
}

/// Everything the cleaning stage observed
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningReport {
    pub tokens_replaced: usize,
    pub inferences: Vec<ColumnInference>,
    pub range_violations: Vec<RangeViolation>,
    pub outliers: Vec<OutlierCount>,
    pub dropped_columns: Vec<String>,
    pub imputed: Vec<ImputedColumn>,
}

// ============================================================================
// ML Types
// ============================================================================

/// Dense numeric matrix extracted from a dataset
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Feature names (column headers)
    pub names: Vec<String>,
    /// Row data as feature vectors
    pub data: Vec<Vec<f64>>,
    /// Original row indices (for mapping back)
    pub row_indices: Vec<usize>,
}

impl FeatureMatrix {
    /// Get number of samples (rows)
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.len()
    }

    /// Get number of features (columns)
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Get a feature column by index
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.n_features() {
            return None;
        }
        Some(self.data.iter().map(|row| row[index]).collect())
    }

    /// Convert to flat `Vec<f64>` (row-major)
    #[must_use]
    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().flatten().copied().collect()
    }
}

/// Descriptive statistics for a numeric column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl ColumnStats {
    /// Tukey fences `(Q1 - 1.5 IQR, Q3 + 1.5 IQR)`
    #[must_use]
    pub fn outlier_bounds(&self) -> (f64, f64) {
        (self.q1 - 1.5 * self.iqr, self.q3 + 1.5 * self.iqr)
    }

    /// Detect outliers using IQR method (values outside 1.5 * IQR)
    #[must_use]
    pub fn outlier_indices(&self, values: &[f64]) -> Vec<usize> {
        let (lower_bound, upper_bound) = self.outlier_bounds();

        values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v < lower_bound || v > upper_bound)
            .map(|(i, _)| i)
            .collect()
    }

    /// Format as a summary string
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: n={}, mean={:.2}, std={:.2}, min={:.2}, Q1={:.2}, median={:.2}, Q3={:.2}, max={:.2}, IQR={:.2}",
            self.name, self.count, self.mean, self.std_dev, self.min, self.q1, self.median, self.q3, self.max, self.iqr
        )
    }
}

/// Pearson correlation with its two-sided p-value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationEntry {
    pub corr: f64,
    pub p_value: f64,
}

/// The three headline correlations between stress, sleep and total score
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub stress_total: CorrelationEntry,
    pub sleep_total: CorrelationEntry,
    pub stress_sleep: CorrelationEntry,
}

impl CorrelationReport {
    #[must_use]
    pub fn entries(&self) -> [(&'static str, &CorrelationEntry); 3] {
        [
            ("stress_total", &self.stress_total),
            ("sleep_total", &self.sleep_total),
            ("stress_sleep", &self.stress_sleep),
        ]
    }
}

/// `NxN` Pearson correlation matrix
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

/// One estimated regression parameter
#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Result of an ordinary least squares fit
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub dependent: String,
    pub coefficients: Vec<Coefficient>,
    pub fitted_values: Vec<f64>,
    pub residuals: Vec<f64>,
    pub n_obs: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Covariance matrix of the estimates, ordered like `coefficients`
    pub cov_params: Array2<f64>,
}

/// Coefficient and p-value of a named predictor; `None` when not in the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Effect {
    pub coef: Option<f64>,
    pub p_value: Option<f64>,
}

/// Effects of the three engineered predictors
#[derive(Debug, Clone, Serialize)]
pub struct ModelEffects {
    pub beta_stress: Effect,
    pub beta_sleep: Effect,
    pub beta_interaction: Effect,
}

impl ModelEffects {
    #[must_use]
    pub fn entries(&self) -> [(&'static str, &Effect); 3] {
        [
            ("beta_stress", &self.beta_stress),
            ("beta_sleep", &self.beta_sleep),
            ("beta_interaction", &self.beta_interaction),
        ]
    }
}

/// Variance inflation factor of one design column
#[derive(Debug, Clone, Serialize)]
pub struct VifEntry {
    pub feature: String,
    pub vif: f64,
}

/// Result of PCA projection
#[derive(Debug, Clone)]
pub struct PcaResult {
    pub n_components: usize,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    /// Projected scores, one row per sample
    pub scores: Vec<Vec<f64>>,
    /// Original row indices of each projected sample
    pub row_indices: Vec<usize>,
}

/// Result of K-means clustering
#[derive(Debug, Clone)]
pub struct ClusterResult {
    /// Cluster assignment for each sample
    pub labels: Vec<usize>,
    /// Number of clusters
    pub k: usize,
    /// Cluster sizes
    pub sizes: Vec<usize>,
    /// Cluster centroids in the clustered space
    pub centroids: Vec<Vec<f64>>,
}

impl ClusterResult {
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write as _;

        let mut s = format!("K-means clustering with k={}\n", self.k);
        for (i, size) in self.sizes.iter().enumerate() {
            let _ = writeln!(s, "  Cluster {i}: {size} samples");
        }
        s
    }
}

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub raw_shape: (usize, usize),
    pub cleaning: CleaningReport,
    pub features: Dataset,
    pub column_stats: Vec<ColumnStats>,
    pub correlations: CorrelationReport,
    pub pca: PcaResult,
    pub clusters: ClusterResult,
    pub model: FittedModel,
    pub effects: ModelEffects,
    pub vif: Vec<VifEntry>,
}
