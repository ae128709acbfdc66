//! Inference engine module
//!
//! Provides the fitted artifacts behind a prediction:
//! - Feature table and request feature assembly
//! - Column-wise scaler
//! - Binary classifiers
//! - Startup artifact loading

pub mod artifacts;
pub mod classifier;
pub mod features;
pub mod scaler;

pub use artifacts::Artifacts;
pub use classifier::{Classifier, ClassifierModel};
pub use features::{FeatureVector, LabeledRecord, ValidationErrors, FEATURE_COLUMNS};
pub use scaler::{ColumnTransformer, Scaler};
