//! Service layer types

/// Human reading of the classifier's label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Benign,
    Malignant,
}

impl Verdict {
    /// Label 1 is malignant; every other label reads as benign
    pub fn from_label(label: i64) -> Self {
        if label == 1 {
            Verdict::Malignant
        } else {
            Verdict::Benign
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Benign => "Benign",
            Verdict::Malignant => "Malignant",
        }
    }
}

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionResult {
    pub prediction: i64,
    pub verdict: Verdict,
    pub message: String,
}

impl PredictionResult {
    pub fn from_label(label: i64) -> Self {
        let verdict = Verdict::from_label(label);
        Self {
            prediction: label,
            verdict,
            message: format!("The tumor is classified as {}", verdict.as_str()),
        }
    }
}
