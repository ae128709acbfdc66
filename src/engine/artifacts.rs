//! Artifact Loader
//!
//! Loads the fitted scaler and classifier once at startup. Both are
//! immutable afterwards and shared by every request through `Arc`.
//! Any inconsistency is a startup failure: the service never runs
//! without a usable model.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::ArtifactsConfig;

use super::classifier::{Classifier, ClassifierArtifact, ClassifierModel};
use super::features::internal_columns;
use super::scaler::{ColumnTransformer, ColumnTransformerArtifact, Scaler};

/// The fitted scaler/classifier pair used by the prediction pipeline
#[derive(Clone)]
pub struct Artifacts {
    scaler: Arc<dyn Scaler>,
    model: Arc<dyn Classifier>,
}

impl Artifacts {
    /// Load and cross-check both artifacts from the configured paths
    pub fn load(config: &ArtifactsConfig) -> Result<Self> {
        let start = Instant::now();

        let scaler = load_scaler(&config.scaler)?;
        info!(
            "Scaler loaded from {} ({} output columns)",
            config.scaler.display(),
            scaler.n_features_out()
        );
        debug!("Scaler output columns: {:?}", scaler.output_columns().collect::<Vec<_>>());

        let model = load_model(&config.model)?;
        info!(
            "Model loaded from {} (kind: {}, {} input features)",
            config.model.display(),
            model.kind(),
            model.n_features_in()
        );

        let artifacts = Self::from_parts(Arc::new(scaler), Arc::new(model))?;
        info!("Artifacts ready in {:?}", start.elapsed());
        Ok(artifacts)
    }

    /// Pair an already-built scaler and classifier, checking they fit together
    pub fn from_parts(scaler: Arc<dyn Scaler>, model: Arc<dyn Classifier>) -> Result<Self> {
        if scaler.n_features_out() != model.n_features_in() {
            bail!(
                "scaler produces {} features but the model expects {}",
                scaler.n_features_out(),
                model.n_features_in()
            );
        }

        let mut classes = model.classes().to_vec();
        classes.sort_unstable();
        if classes != [0, 1] {
            bail!("model classes must be {{0, 1}}, got {:?}", model.classes());
        }

        Ok(Self { scaler, model })
    }

    pub fn scaler(&self) -> &dyn Scaler {
        self.scaler.as_ref()
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }
}

impl fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifacts")
            .field("n_features_out", &self.scaler.n_features_out())
            .field("n_features_in", &self.model.n_features_in())
            .field("classes", &self.model.classes())
            .finish()
    }
}

/// Read a column transformer artifact, resolved against the canonical columns
pub fn load_scaler(path: &Path) -> Result<ColumnTransformer> {
    let artifact: ColumnTransformerArtifact = read_json(path, "scaler")?;
    ColumnTransformer::from_artifact(artifact, &internal_columns())
        .with_context(|| format!("scaler artifact {} is invalid", path.display()))
}

/// Read a classifier artifact
pub fn load_model(path: &Path) -> Result<ClassifierModel> {
    let artifact: ClassifierArtifact = read_json(path, "model")?;
    ClassifierModel::from_artifact(artifact)
        .with_context(|| format!("model artifact {} is invalid", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read(path)
        .with_context(|| format!("failed to read {} artifact {}", what, path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("{} artifact {} is not in the expected format", what, path.display()))
}
