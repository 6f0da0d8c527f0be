//! Missing-token normalization, type inference, diagnostics and imputation

use crate::ml::stats::median;
use crate::schema::StudentSchema;
use crate::structs::{
    CleaningReport, Column, ColumnInference, ColumnStats, ColumnType, Dataset, ImputedColumn,
    OutlierCount, RangeViolation, TypeInference, Value,
};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Literal strings treated as missing values
pub const MISSING_TOKENS: [&str; 8] = ["", " ", "NA", "N/A", "None", "?", "null", "Null"];

/// Columns with a larger missing fraction are dropped
pub const MAX_MISSING_RATIO: f64 = 0.5;

/// Number of values checked against the date pattern
const DATE_SAMPLE_SIZE: usize = 10;

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4}").expect("date pattern is valid")
});

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

#[must_use]
pub fn is_missing_token(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw) || raw.trim().is_empty()
}

/// Replace missing-value tokens with `Value::Missing`, returning the number replaced
pub fn standardize_missing_tokens(dataset: &mut Dataset) -> usize {
    let mut replaced = 0;
    for column in dataset.columns_mut() {
        for value in &mut column.values {
            if matches!(value, Value::Text(s) if is_missing_token(s)) {
                *value = Value::Missing;
                replaced += 1;
            }
        }
    }
    replaced
}

fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::Int(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_nan() => Some(Value::Missing),
        Ok(f) => Some(Value::Float(f)),
        Err(_) => None,
    }
}

/// Parse a date or datetime in one of the accepted layouts
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn try_numeric(column: &Column) -> Option<(ColumnType, Vec<Value>)> {
    let parsed: Vec<Value> = column
        .values
        .iter()
        .map(|v| match v {
            Value::Text(s) => parse_number(s),
            other => Some(other.clone()),
        })
        .collect::<Option<_>>()?;

    let all_int = parsed.iter().all(|v| matches!(v, Value::Int(_)));

    if all_int {
        return Some((ColumnType::Integer, parsed));
    }

    // Any gap or fractional value makes the whole column float
    #[allow(clippy::cast_precision_loss)]
    let floats = parsed
        .into_iter()
        .map(|v| match v {
            Value::Int(i) => Value::Float(i as f64),
            other => other,
        })
        .collect();
    Some((ColumnType::Float, floats))
}

fn looks_temporal(column: &Column) -> bool {
    column
        .values
        .iter()
        .filter_map(|v| match v {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        })
        .take(DATE_SAMPLE_SIZE)
        .any(|s| DATE_PATTERN.is_match(s))
}

/// Infer and apply the best type for a single column
pub fn infer_column(column: &mut Column) -> TypeInference {
    if column.kind != ColumnType::Text {
        return TypeInference::AlreadyTyped { kind: column.kind };
    }

    if let Some((kind, values)) = try_numeric(column) {
        column.kind = kind;
        column.values = values;
        return TypeInference::Numeric { kind };
    }

    if looks_temporal(column) {
        let mut coerced = 0;
        for value in &mut column.values {
            if let Value::Text(s) = value {
                *value = match parse_timestamp(s) {
                    Some(ts) => Value::Timestamp(ts),
                    None => {
                        coerced += 1;
                        Value::Missing
                    }
                };
            }
        }
        column.kind = ColumnType::Timestamp;
        return TypeInference::Timestamp { coerced };
    }

    TypeInference::Text
}

/// Run type inference over every column
pub fn convert_column_types(dataset: &mut Dataset) -> Vec<ColumnInference> {
    dataset
        .columns_mut()
        .iter_mut()
        .map(|column| {
            let inference = infer_column(column);
            debug!("Column {} inferred as {:?}", column.name, inference);
            ColumnInference {
                column: column.name.clone(),
                inference,
            }
        })
        .collect()
}

/// Count values outside the schema's range rules; nothing is modified
#[must_use]
pub fn detect_invalid_values(dataset: &Dataset, schema: &StudentSchema) -> Vec<RangeViolation> {
    let mut violations = Vec::new();

    for rule in &schema.range_rules {
        let Some(column) = dataset.column(&rule.column) else {
            continue;
        };
        if !column.is_numeric() {
            debug!("Skipping range check on non-numeric column {}", rule.column);
            continue;
        }

        let count = column
            .numeric_values()
            .into_iter()
            .filter(|&v| rule.violates(v))
            .count();
        info!("Invalid {} values: {}", rule.label, count);

        violations.push(RangeViolation {
            column: rule.column.clone(),
            label: rule.label.clone(),
            count,
        });
    }

    violations
}

/// Count IQR outliers per numeric column; nothing is modified
#[must_use]
pub fn detect_outliers(dataset: &Dataset) -> Vec<OutlierCount> {
    let mut outliers = Vec::new();

    for column in dataset.columns().iter().filter(|c| c.is_numeric()) {
        let values = column.numeric_values();
        let Ok(stats) = ColumnStats::calculate(&column.name, &values) else {
            continue;
        };

        let (lower, upper) = stats.outlier_bounds();
        let count = stats.outlier_indices(&values).len();
        if count > 0 {
            info!("Outliers in {}: {}", column.name, count);
            outliers.push(OutlierCount {
                column: column.name.clone(),
                lower,
                upper,
                count,
            });
        }
    }

    outliers
}

/// Most frequent key; ties go to the smallest key
fn mode_of<K: Ord>(keys: impl Iterator<Item = K>) -> Option<K> {
    let mut counts: BTreeMap<K, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

fn fill_value(column: &Column) -> Option<Value> {
    match column.kind {
        ColumnType::Integer | ColumnType::Float => {
            median(&column.numeric_values()).map(Value::Float)
        }
        ColumnType::Text => mode_of(column.values.iter().filter_map(|v| match v {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }))
        .map(|s| Value::Text(s.to_string())),
        ColumnType::Timestamp => mode_of(column.values.iter().filter_map(|v| match v {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }))
        .map(Value::Timestamp),
    }
}

/// Drop mostly-missing columns and impute the rest (median or mode)
pub fn handle_missing_values(dataset: &mut Dataset) -> (Vec<String>, Vec<ImputedColumn>) {
    let to_drop: Vec<String> = dataset
        .columns()
        .iter()
        .filter(|c| c.missing_ratio() > MAX_MISSING_RATIO)
        .map(|c| c.name.clone())
        .collect();

    for name in &to_drop {
        dataset.drop_column(name);
        info!("Dropped column {name}: more than half of its values are missing");
    }

    let mut imputed = Vec::new();
    for column in dataset.columns_mut() {
        let missing = column.missing_count();
        if missing == 0 {
            continue;
        }
        let Some(fill) = fill_value(column) else {
            continue;
        };

        if column.kind == ColumnType::Integer {
            column.kind = ColumnType::Float;
        }
        for value in column.values.iter_mut().filter(|v| v.is_missing()) {
            *value = fill.clone();
        }

        debug!("Filled {missing} missing values in {} with {fill}", column.name);
        imputed.push(ImputedColumn {
            column: column.name.clone(),
            filled: missing,
            fill_value: fill.to_string(),
        });
    }

    (to_drop, imputed)
}

/// Apply every cleaning step in sequence, returning the cleaned copy and a report
#[must_use]
pub fn clean_full_dataset(raw: &Dataset, schema: &StudentSchema) -> (Dataset, CleaningReport) {
    info!("Starting full dataset cleaning pipeline");
    let mut dataset = raw.clone();

    let tokens_replaced = standardize_missing_tokens(&mut dataset);
    let inferences = convert_column_types(&mut dataset);
    let range_violations = detect_invalid_values(&dataset, schema);
    let outliers = detect_outliers(&dataset);
    let (dropped_columns, imputed) = handle_missing_values(&mut dataset);

    info!("Final cleaned dataset shape: {:?}", dataset.shape());

    let report = CleaningReport {
        tokens_replaced,
        inferences,
        range_violations,
        outliers,
        dropped_columns,
        imputed,
    };
    (dataset, report)
}
