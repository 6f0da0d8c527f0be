use crate::structs::{Column, ColumnType, Dataset, PipelineError, Result, Value};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, error, info};

/// Cells read as missing before any cleaning, matched exactly
pub const READ_NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Represents a parsed CSV/TSV file with headers and rows
#[derive(Debug, Clone)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvData {
    /// Parse a CSV or TSV file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path, is_tsv: bool) -> Result<Self> {
        let delimiter = if is_tsv { b'\t' } else { b',' };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(ToString::to_string)
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: Vec<String> = record.iter().map(ToString::to_string).collect();
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Get number of rows
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get number of columns
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.headers.len()
    }

    /// Convert to an untyped dataset
    ///
    /// Cells in [`READ_NA_VALUES`] and cells past the end of a short row are missing.
    ///
    /// # Errors
    /// Returns error if the header contains duplicate names
    pub fn into_dataset(self) -> Result<Dataset> {
        let mut columns: Vec<Vec<String>> = vec![Vec::with_capacity(self.rows.len()); self.headers.len()];

        for row in self.rows {
            let mut cells = row.into_iter();
            for column in &mut columns {
                column.push(cells.next().unwrap_or_default());
            }
        }

        let mut dataset = Dataset::default();
        for (name, values) in self.headers.into_iter().zip(columns) {
            if dataset.has_column(&name) {
                return Err(PipelineError::InvalidColumn {
                    column: name,
                    reason: "duplicate header".into(),
                });
            }
            let values = values
                .into_iter()
                .map(|s| {
                    if READ_NA_VALUES.contains(&s.as_str()) {
                        Value::Missing
                    } else {
                        Value::Text(s)
                    }
                })
                .collect();
            dataset.set_column(Column::new(name, ColumnType::Text, values))?;
        }
        Ok(dataset)
    }
}

/// Load the student dataset, failing fast when the file is absent
///
/// Files with a `.tsv` extension are read tab-separated.
///
/// # Errors
/// Returns `SourceNotFound` if the path does not exist, or a parse error
pub fn load_student_data(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        error!("Data file not found at path: {}", path.display());
        return Err(PipelineError::SourceNotFound(path.to_path_buf()));
    }

    info!("Loading data from {}", path.display());
    let is_tsv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
    let csv = CsvData::from_file(path, is_tsv)?;
    debug!("Parsed {} rows x {} fields", csv.row_count(), csv.col_count());
    let dataset = csv.into_dataset()?;
    info!("Data loaded successfully with shape {:?}", dataset.shape());

    Ok(dataset)
}
