//! Prediction Service - Core business logic
//!
//! Runs the scaler and classifier over one feature vector.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use crate::engine::{Artifacts, FeatureVector};

use super::types::*;

/// Tumor classification service
pub struct PredictionService {
    artifacts: Artifacts,
}

impl PredictionService {
    /// Create a new prediction service
    pub fn new(artifacts: Artifacts) -> Self {
        Self { artifacts }
    }

    /// Classify one sample on the blocking pool.
    ///
    /// A panic inside an artifact surfaces as an error for this request only.
    pub async fn predict(&self, features: FeatureVector) -> Result<PredictionResult> {
        let start = Instant::now();

        let artifacts = self.artifacts.clone();
        let label = tokio::task::spawn_blocking(move || run_pipeline(&artifacts, &features))
            .await
            .context("prediction task aborted")??;

        let result = PredictionResult::from_label(label);
        debug!(
            "Prediction {} ({}) in {:?}",
            result.prediction,
            result.verdict.as_str(),
            start.elapsed()
        );
        Ok(result)
    }

    /// Classify one sample on the calling thread
    pub fn predict_sync(&self, features: &FeatureVector) -> Result<PredictionResult> {
        run_pipeline(&self.artifacts, features).map(PredictionResult::from_label)
    }
}

/// Record -> scaler -> classifier
fn run_pipeline(artifacts: &Artifacts, features: &FeatureVector) -> Result<i64> {
    let record = features.to_record();
    let scaled = artifacts
        .scaler()
        .transform(&record)
        .context("scaler transform failed")?;
    artifacts
        .model()
        .predict(scaled.view())
        .context("model predict failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use anyhow::bail;
    use ndarray::{Array1, ArrayView1};

    use crate::engine::{Classifier, LabeledRecord, Scaler};

    /// Emits the record values in order and remembers the column names it saw
    #[derive(Default)]
    struct RecordingScaler {
        seen: Mutex<Vec<String>>,
    }

    impl Scaler for RecordingScaler {
        fn n_features_out(&self) -> usize {
            10
        }

        fn transform(&self, record: &LabeledRecord) -> Result<Array1<f64>> {
            *self.seen.lock().unwrap() = record.column_names().map(String::from).collect();
            Ok(record.iter().map(|(_, v)| v).collect())
        }
    }

    /// Malignant when the first scaled value exceeds a threshold
    struct ThresholdModel(f64);

    impl Classifier for ThresholdModel {
        fn n_features_in(&self) -> usize {
            10
        }

        fn classes(&self) -> &[i64] {
            &[0, 1]
        }

        fn predict(&self, x: ArrayView1<'_, f64>) -> Result<i64> {
            Ok(if x[0] > self.0 { 1 } else { 0 })
        }
    }

    struct FailingModel;

    impl Classifier for FailingModel {
        fn n_features_in(&self) -> usize {
            10
        }

        fn classes(&self) -> &[i64] {
            &[0, 1]
        }

        fn predict(&self, _x: ArrayView1<'_, f64>) -> Result<i64> {
            bail!("feature shape mismatch")
        }
    }

    struct PanickingModel;

    impl Classifier for PanickingModel {
        fn n_features_in(&self) -> usize {
            10
        }

        fn classes(&self) -> &[i64] {
            &[0, 1]
        }

        fn predict(&self, _x: ArrayView1<'_, f64>) -> Result<i64> {
            panic!("corrupt model state")
        }
    }

    fn features(radius: f64) -> FeatureVector {
        FeatureVector::new([radius, 10.38, 122.8, 1001.0, 0.1184, 0.2776, 0.3001, 0.1471, 0.2419, 0.07871])
    }

    #[tokio::test]
    async fn test_predict_maps_labels() {
        let artifacts =
            Artifacts::from_parts(Arc::new(RecordingScaler::default()), Arc::new(ThresholdModel(15.0))).unwrap();
        let service = PredictionService::new(artifacts);

        let malignant = service.predict(features(17.99)).await.unwrap();
        assert_eq!(malignant.prediction, 1);
        assert_eq!(malignant.verdict, Verdict::Malignant);

        let benign = service.predict(features(11.0)).await.unwrap();
        assert_eq!(benign.prediction, 0);
        assert_eq!(benign.verdict, Verdict::Benign);
    }

    #[tokio::test]
    async fn test_predict_is_deterministic() {
        let artifacts =
            Artifacts::from_parts(Arc::new(RecordingScaler::default()), Arc::new(ThresholdModel(15.0))).unwrap();
        let service = PredictionService::new(artifacts);

        let first = service.predict(features(15.5)).await.unwrap();
        let second = service.predict(features(15.5)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.predict_sync(&features(15.5)).unwrap(), first);
    }

    #[test]
    fn test_scaler_sees_internal_column_names() {
        let scaler = Arc::new(RecordingScaler::default());
        let artifacts = Artifacts::from_parts(scaler.clone(), Arc::new(ThresholdModel(0.0))).unwrap();
        PredictionService::new(artifacts).predict_sync(&features(1.0)).unwrap();

        let seen = scaler.seen.lock().unwrap();
        assert_eq!(seen.len(), 10);
        assert!(seen.iter().any(|c| c == "concave points_mean"));
        assert!(!seen.iter().any(|c| c == "concave_points_mean"));
    }

    #[tokio::test]
    async fn test_model_error_is_returned() {
        let artifacts =
            Artifacts::from_parts(Arc::new(RecordingScaler::default()), Arc::new(FailingModel)).unwrap();
        let err = PredictionService::new(artifacts).predict(features(1.0)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("feature shape mismatch"));
    }

    #[tokio::test]
    async fn test_model_panic_is_contained() {
        let artifacts =
            Artifacts::from_parts(Arc::new(RecordingScaler::default()), Arc::new(PanickingModel)).unwrap();
        let service = PredictionService::new(artifacts);
        assert!(service.predict(features(1.0)).await.is_err());
    }
}
