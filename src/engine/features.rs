//! Feature table and request feature assembly
//!
//! The request body names measurements with underscores only, while the
//! fitted scaler addresses its columns by the names of the training dataset,
//! one of which contains a space (`concave points_mean`). `FEATURE_COLUMNS`
//! is the single mapping between the two; nothing else in the crate spells
//! out a feature name.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Number of measurements per sample
pub const FEATURE_COUNT: usize = 10;

/// One input measurement: its request key and its training-time column identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureColumn {
    pub external: &'static str,
    pub internal: &'static str,
}

const fn column(external: &'static str, internal: &'static str) -> FeatureColumn {
    FeatureColumn { external, internal }
}

/// Canonical feature order, identical to the column order the scaler was fitted on
pub const FEATURE_COLUMNS: [FeatureColumn; FEATURE_COUNT] = [
    column("radius_mean", "radius_mean"),
    column("texture_mean", "texture_mean"),
    column("perimeter_mean", "perimeter_mean"),
    column("area_mean", "area_mean"),
    column("smoothness_mean", "smoothness_mean"),
    column("compactness_mean", "compactness_mean"),
    column("concavity_mean", "concavity_mean"),
    column("concave_points_mean", "concave points_mean"),
    column("symmetry_mean", "symmetry_mean"),
    column("fractal_dimension_mean", "fractal_dimension_mean"),
];

/// Internal column identities in canonical order
pub fn internal_columns() -> [&'static str; FEATURE_COUNT] {
    FEATURE_COLUMNS.map(|c| c.internal)
}

/// The ten measurements of one sample, in canonical order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    /// Look up a measurement by its request key
    pub fn get(&self, external: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| c.external == external)
            .map(|idx| self.0[idx])
    }

    /// Assemble a feature vector from a decoded request body.
    ///
    /// Every field is checked; the returned error lists all problems rather
    /// than the first one. Only JSON numbers are accepted, numeric strings
    /// included in the rejection.
    pub fn from_json(body: &Value, reject_unknown: bool) -> Result<Self, ValidationErrors> {
        let object = match body.as_object() {
            Some(object) => object,
            None => {
                return Err(ValidationErrors::single(FieldError::new(
                    None,
                    "Input should be a valid JSON object",
                    "model_type",
                )))
            }
        };

        let mut errors = Vec::new();
        let mut values = [0.0; FEATURE_COUNT];

        for (slot, col) in values.iter_mut().zip(FEATURE_COLUMNS.iter()) {
            match object.get(col.external) {
                None => errors.push(FieldError::new(Some(col.external), "Field required", "missing")),
                Some(value) => match value.as_f64() {
                    Some(v) => *slot = v,
                    None => errors.push(FieldError::new(
                        Some(col.external),
                        "Input should be a valid number",
                        "float_type",
                    )),
                },
            }
        }

        if reject_unknown {
            for key in object.keys() {
                if !FEATURE_COLUMNS.iter().any(|c| c.external == key) {
                    errors.push(FieldError::new(
                        Some(key.as_str()),
                        "Extra inputs are not permitted",
                        "extra_forbidden",
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(Self(values))
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Materialize as a single-row record keyed by internal column identity
    pub fn to_record(&self) -> LabeledRecord {
        let mut columns = [("", 0.0); FEATURE_COUNT];
        for (slot, (col, value)) in columns.iter_mut().zip(FEATURE_COLUMNS.iter().zip(self.0)) {
            *slot = (col.internal, value);
        }
        LabeledRecord { columns }
    }
}

/// A single-row record whose columns carry the training-time names
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    columns: [(&'static str, f64); FEATURE_COUNT],
}

impl LabeledRecord {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| *value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.columns.iter().copied()
    }
}

/// Field-level validation problem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(field: Option<&str>, msg: &str, kind: &str) -> Self {
        let mut loc = vec!["body".to_string()];
        if let Some(field) = field {
            loc.push(field.to_string());
        }
        Self {
            loc,
            msg: msg.to_string(),
            kind: kind.to_string(),
        }
    }

    /// The offending field, if the error is attached to one
    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).map(String::as_str)
    }
}

/// All validation problems found in one request body
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(error: FieldError) -> Self {
        Self(vec![error])
    }

    /// Body could not be decoded as JSON at all
    pub fn json_invalid(reason: &str) -> Self {
        Self::single(FieldError::new(
            None,
            &format!("JSON decode error: {}", reason),
            "json_invalid",
        ))
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.loc.join("."), e.msg))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
