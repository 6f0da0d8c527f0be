//! PCA dimensionality reduction using linfa-reduction

use crate::structs::{FeatureMatrix, PcaResult, PipelineError, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::{Array2, Axis};
use tracing::info;

/// Project the feature matrix onto its leading principal components
///
/// Data is mean-centered by the PCA fit but not rescaled. Explained-variance
/// ratios are relative to the total variance, so they sum to less than one
/// when fewer components than features are kept.
///
/// # Errors
/// Returns error if PCA computation fails (e.g., too few samples)
pub fn run_pca(features: &FeatureMatrix, n_components: usize) -> Result<PcaResult> {
    let n_samples = features.n_samples();
    let n_features = features.n_features();

    if n_features < 2 {
        return Err(PipelineError::Ml("PCA requires at least 2 features".into()));
    }
    if n_samples < 2 {
        return Err(PipelineError::Ml("PCA requires at least 2 samples".into()));
    }
    if n_components == 0 {
        return Err(PipelineError::Config(
            "PCA needs at least one component".into(),
        ));
    }

    let n_components = n_components.min(n_features).min(n_samples - 1);

    // Build ndarray
    let flat_data = features.to_flat();
    let array = Array2::from_shape_vec((n_samples, n_features), flat_data)
        .map_err(|e| PipelineError::Ml(format!("Failed to create array for PCA: {e}")))?;

    let dataset = DatasetBase::from(array.clone());

    // Fit PCA
    let pca = Pca::params(n_components)
        .fit(&dataset)
        .map_err(|e| PipelineError::Ml(format!("PCA failed: {e}")))?;

    // Squared singular values over the total sum of squares of the centered data
    let singular_values = pca.singular_values();
    let total_variance: f64 = match array.mean_axis(Axis(0)) {
        Some(means) => (&array - &means).mapv(|v| v * v).sum(),
        None => 0.0,
    };

    let explained_variance_ratio: Vec<f64> = if total_variance > 0.0 {
        singular_values
            .iter()
            .map(|s| ((s * s) / total_variance).min(1.0))
            .collect()
    } else {
        vec![0.0; n_components]
    };

    // Cumulative variance
    let mut cumulative = Vec::with_capacity(n_components);
    let mut running = 0.0;
    for &ratio in &explained_variance_ratio {
        running += ratio;
        cumulative.push(running);
    }

    let projected: Array2<f64> = pca.predict(&array);
    let scores: Vec<Vec<f64>> = projected.rows().into_iter().map(|r| r.to_vec()).collect();

    info!(
        "PCA reduced {} features to {} components",
        n_features, n_components
    );

    Ok(PcaResult {
        n_components,
        explained_variance_ratio,
        cumulative_variance: cumulative,
        scores,
        row_indices: features.row_indices.clone(),
    })
}

impl PcaResult {
    /// Projected scores as a feature matrix (`PC1`, `PC2`, ...)
    #[must_use]
    pub fn to_features(&self) -> FeatureMatrix {
        FeatureMatrix {
            names: (1..=self.n_components).map(|i| format!("PC{i}")).collect(),
            data: self.scores.clone(),
            row_indices: self.row_indices.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureMatrix {
        FeatureMatrix {
            names: vec!["a".into(), "b".into(), "c".into()],
            data: vec![
                vec![1.0, 2.0, 3.5],
                vec![2.0, 4.5, 5.0],
                vec![3.0, 6.0, 7.5],
                vec![4.0, 7.5, 9.0],
                vec![5.0, 10.0, 11.5],
            ],
            row_indices: vec![0, 1, 2, 3, 4],
        }
    }

    #[test]
    fn test_run_pca() {
        let result = run_pca(&features(), 2).expect("pca");

        assert_eq!(result.n_components, 2);
        assert_eq!(result.scores.len(), 5);
        assert!(result.scores.iter().all(|row| row.len() == 2));
        assert!(!result.explained_variance_ratio.is_empty());
        // Cumulative should be monotonically increasing
        for i in 1..result.cumulative_variance.len() {
            assert!(result.cumulative_variance[i] >= result.cumulative_variance[i - 1]);
        }
        // Nearly collinear data is dominated by the first component
        assert!(result.explained_variance_ratio[0] > 0.9);
    }

    #[test]
    fn test_pca_too_few_features() {
        let single = FeatureMatrix {
            names: vec!["a".into()],
            data: vec![vec![1.0], vec![2.0], vec![3.0]],
            row_indices: vec![0, 1, 2],
        };

        let result = run_pca(&single, 2);
        assert!(result.is_err());
    }

    #[test]
    fn test_to_features_names_components() {
        let result = run_pca(&features(), 2).expect("pca");
        let projected = result.to_features();

        assert_eq!(projected.names, vec!["PC1", "PC2"]);
        assert_eq!(projected.n_samples(), 5);
    }

    #[test]
    fn test_explained_variance_is_relative_to_total() {
        // Three orthogonal axes with equal spread
        let axes = FeatureMatrix {
            names: vec!["a".into(), "b".into(), "c".into()],
            data: vec![
                vec![1.0, 0.0, 0.0],
                vec![-1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, -1.0, 0.0],
                vec![0.0, 0.0, 1.0],
                vec![0.0, 0.0, -1.0],
            ],
            row_indices: (0..6).collect(),
        };

        let result = run_pca(&axes, 2).expect("pca");

        for ratio in &result.explained_variance_ratio {
            assert!((ratio - 1.0 / 3.0).abs() < 1e-6);
        }
        assert!((result.cumulative_variance[1] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_example_pca_then_kmeans_labels_every_row() {
        use crate::ml::clustering::kmeans;
        use crate::ml::features::engineer_features;
        use crate::schema::StudentSchema;
        use crate::structs::{Column, Dataset};

        let raw = Dataset::from_columns(vec![
            Column::float("Stress_Level (1-10)", vec![3.0, 5.0, 7.0, 8.0]),
            Column::float("Sleep_Hours_per_Night", vec![8.0, 7.0, 6.0, 5.0]),
            Column::float("Total_Score", vec![90.0, 85.0, 80.0, 70.0]),
        ])
        .expect("dataset");
        let engineered = engineer_features(&raw, &StudentSchema::default()).expect("features");
        let matrix = FeatureMatrix::from_dataset(&engineered).expect("matrix");
        // More features than samples
        assert_eq!(matrix.n_features(), 7);
        assert_eq!(matrix.n_samples(), 4);

        let pca = run_pca(&matrix, 2).expect("pca");
        assert_eq!(pca.n_components, 2);

        let clusters = kmeans(&pca.to_features(), 3).expect("kmeans");

        assert_eq!(clusters.labels.len(), 4);
        assert!(clusters.labels.iter().all(|&l| l < 3));
        assert_eq!(clusters.sizes.iter().sum::<usize>(), 4);
    }
}
