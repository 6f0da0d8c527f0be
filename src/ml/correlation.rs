//! Correlation matrix computation

use crate::ml::stats::correlation;
use crate::structs::{CorrelationMatrix, FeatureMatrix};

/// Compute the `NxN` correlation matrix between all numeric features
///
/// Pairs involving a constant feature are undefined and reported as NaN.
#[must_use]
pub fn correlation_matrix(features: &FeatureMatrix) -> CorrelationMatrix {
    let n = features.n_features();
    let mut matrix = vec![vec![0.0; n]; n];

    let columns: Vec<Vec<f64>> = (0..n)
        .filter_map(|i| features.column(i))
        .collect();

    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = correlation(&columns[i], &columns[j]).unwrap_or(f64::NAN);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }

    CorrelationMatrix {
        names: features.names.clone(),
        matrix,
    }
}

/// Restrict a feature matrix to the named columns, keeping the given order
#[must_use]
pub fn select_features(features: &FeatureMatrix, names: &[&str]) -> FeatureMatrix {
    let indices: Vec<usize> = names
        .iter()
        .filter_map(|name| features.names.iter().position(|n| n == name))
        .collect();

    FeatureMatrix {
        names: indices.iter().map(|&i| features.names[i].clone()).collect(),
        data: features
            .data
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect(),
        row_indices: features.row_indices.clone(),
    }
}
