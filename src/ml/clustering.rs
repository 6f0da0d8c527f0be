use crate::structs::{ClusterResult, FeatureMatrix, PipelineError, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2};
use tracing::info;

/// Perform K-means clustering on a feature matrix
///
/// The linfa default RNG is seeded, so repeated runs give the same labels.
///
/// # Errors
/// Returns error if clustering fails
pub fn kmeans(features: &FeatureMatrix, k: usize) -> Result<ClusterResult> {
    let n_samples = features.n_samples();

    if k == 0 {
        return Err(PipelineError::Ml("k must be at least 1".into()));
    }

    if n_samples < k {
        return Err(PipelineError::Ml(format!(
            "Cannot create {k} clusters with only {n_samples} samples"
        )));
    }

    // Convert to ndarray Array2
    let flat_data: Vec<f64> = features.to_flat();
    let array = Array2::from_shape_vec((n_samples, features.n_features()), flat_data)
        .map_err(|e| PipelineError::Ml(format!("Failed to create array: {e}")))?;

    // Create dataset
    let dataset = DatasetBase::from(array.clone());

    // Run K-means
    let model = KMeans::params(k)
        .max_n_iterations(300)
        .tolerance(1e-4)
        .fit(&dataset)
        .map_err(|e| PipelineError::Ml(format!("K-means failed: {e}")))?;

    let predictions: Array1<usize> = model.predict(&array);
    let labels: Vec<usize> = predictions.to_vec();

    // Calculate cluster sizes
    let mut sizes: Vec<usize> = vec![0usize; k];

    for &cluster_id in &labels {
        sizes[cluster_id] += 1;
    }

    let centroids: Vec<Vec<f64>> = model
        .centroids()
        .rows()
        .into_iter()
        .map(|r| r.to_vec())
        .collect();

    info!("K-means assigned {} samples to {} clusters", n_samples, k);

    Ok(ClusterResult {
        labels,
        k,
        sizes,
        centroids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusterable() -> FeatureMatrix {
        // Two clear clusters
        let data = vec![
            vec![1.0, 1.0],
            vec![1.1, 1.1],
            vec![0.9, 0.9],
            vec![1.0, 1.2],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
            vec![9.9, 9.9],
            vec![10.0, 10.2],
        ];
        FeatureMatrix {
            names: vec!["x".into(), "y".into()],
            row_indices: (0..data.len()).collect(),
            data,
        }
    }

    #[test]
    fn test_kmeans_clustering() {
        let result = kmeans(&clusterable(), 2).expect("run kmeans");

        assert_eq!(result.k, 2);
        assert_eq!(result.labels.len(), 8);
        assert_eq!(result.centroids.len(), 2);
        // Each cluster should have 4 members
        assert!(result.sizes.iter().all(|&s| s == 4));
        assert!(result.labels[..4].iter().all(|&l| l == result.labels[0]));
    }

    #[test]
    fn test_kmeans_rejects_bad_k() {
        assert!(kmeans(&clusterable(), 0).is_err());
        assert!(kmeans(&clusterable(), 9).is_err());
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let first = kmeans(&clusterable(), 3).expect("first");
        let second = kmeans(&clusterable(), 3).expect("second");

        assert_eq!(first.labels, second.labels);
        assert!(first.labels.iter().all(|&l| l < 3));
    }
}
