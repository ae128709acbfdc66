//! Column-wise feature scaler
//!
//! Mirrors a fitted column transformer: an ordered list of per-column
//! transforms, each owning a named subset of the input columns. Output is
//! the concatenation of every transformer's output in declaration order,
//! followed by the unclaimed (remainder) columns when they are passed through.
//! Columns are resolved by name, so the input record must carry the exact
//! training-time column identities.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use ndarray::Array1;
use serde::Deserialize;

use super::features::LabeledRecord;

/// A fitted transform applied to a labelled record
pub trait Scaler: Send + Sync {
    /// Width of the transformed vector
    fn n_features_out(&self) -> usize;

    fn transform(&self, record: &LabeledRecord) -> Result<Array1<f64>>;
}

/// What happens to input columns no transformer claims
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remainder {
    #[default]
    Drop,
    Passthrough,
}

/// Serialized column transformer
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnTransformerArtifact {
    pub transformers: Vec<TransformerArtifact>,
    #[serde(default)]
    pub remainder: Remainder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformerArtifact {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(flatten)]
    pub kind: TransformKind,
}

/// Fitted parameters per transformer kind, one entry per owned column
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformKind {
    /// `(x - mean) / scale`; either part may be absent when disabled at fit time
    Standard {
        #[serde(default)]
        mean: Option<Vec<f64>>,
        #[serde(default)]
        scale: Option<Vec<f64>>,
    },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
    /// `(x - center) / scale`
    Robust {
        #[serde(default)]
        center: Option<Vec<f64>>,
        #[serde(default)]
        scale: Option<Vec<f64>>,
    },
    Passthrough,
}

/// Per-column affine step: `(x - shift) * factor + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnOp {
    shift: f64,
    factor: f64,
    offset: f64,
}

impl ColumnOp {
    const IDENTITY: ColumnOp = ColumnOp { shift: 0.0, factor: 1.0, offset: 0.0 };

    fn apply(&self, x: f64) -> f64 {
        (x - self.shift) * self.factor + self.offset
    }
}

#[derive(Debug, Clone)]
struct Step {
    column: String,
    op: ColumnOp,
}

/// Validated column transformer ready for request-time use
#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    steps: Vec<Step>,
}

impl ColumnTransformer {
    /// Build from a serialized transformer, checking it against the input columns
    pub fn from_artifact(artifact: ColumnTransformerArtifact, input_columns: &[&str]) -> Result<Self> {
        if artifact.transformers.is_empty() && artifact.remainder == Remainder::Drop {
            bail!("column transformer has no transformers and drops the remainder");
        }

        let known: HashSet<&str> = input_columns.iter().copied().collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut steps = Vec::new();

        for transformer in artifact.transformers {
            let ops = column_ops(&transformer.kind, transformer.columns.len())
                .with_context(|| format!("transformer '{}'", transformer.name))?;

            for (column, op) in transformer.columns.into_iter().zip(ops) {
                if !known.contains(column.as_str()) {
                    bail!(
                        "transformer '{}' references unknown column '{}'",
                        transformer.name,
                        column
                    );
                }
                if !claimed.insert(column.clone()) {
                    bail!("column '{}' is claimed by more than one transformer", column);
                }
                steps.push(Step { column, op });
            }
        }

        if artifact.remainder == Remainder::Passthrough {
            for column in input_columns {
                if !claimed.contains(*column) {
                    steps.push(Step {
                        column: column.to_string(),
                        op: ColumnOp::IDENTITY,
                    });
                }
            }
        }

        if steps.is_empty() {
            bail!("column transformer produces no output columns");
        }

        Ok(Self { steps })
    }

    /// Output column names in output order
    pub fn output_columns(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.column.as_str())
    }
}

impl Scaler for ColumnTransformer {
    fn n_features_out(&self) -> usize {
        self.steps.len()
    }

    fn transform(&self, record: &LabeledRecord) -> Result<Array1<f64>> {
        let mut out = Array1::zeros(self.steps.len());
        for (slot, step) in out.iter_mut().zip(self.steps.iter()) {
            let x = record
                .get(&step.column)
                .with_context(|| format!("input record has no column '{}'", step.column))?;
            let y = step.op.apply(x);
            if !y.is_finite() {
                bail!("column '{}' scaled to a non-finite value", step.column);
            }
            *slot = y;
        }
        Ok(out)
    }
}

fn column_ops(kind: &TransformKind, n_columns: usize) -> Result<Vec<ColumnOp>> {
    if n_columns == 0 {
        bail!("transformer owns no columns");
    }

    let ops = match kind {
        TransformKind::Standard { mean, scale } | TransformKind::Robust { center: mean, scale } => {
            let shifts = optional_params("center", mean.as_deref(), n_columns, 0.0)?;
            let scales = optional_params("scale", scale.as_deref(), n_columns, 1.0)?;
            shifts
                .into_iter()
                .zip(scales)
                .map(|(shift, scale)| {
                    check_scale(scale)?;
                    Ok(ColumnOp { shift, factor: 1.0 / scale, offset: 0.0 })
                })
                .collect::<Result<Vec<_>>>()?
        }
        TransformKind::MinMax { min, scale } => {
            check_len("min", min.len(), n_columns)?;
            check_len("scale", scale.len(), n_columns)?;
            min.iter()
                .zip(scale.iter())
                .map(|(&offset, &factor)| {
                    if !offset.is_finite() || !factor.is_finite() {
                        bail!("min/max parameters must be finite");
                    }
                    Ok(ColumnOp { shift: 0.0, factor, offset })
                })
                .collect::<Result<Vec<_>>>()?
        }
        TransformKind::Passthrough => vec![ColumnOp::IDENTITY; n_columns],
    };

    Ok(ops)
}

fn optional_params(name: &str, values: Option<&[f64]>, n_columns: usize, default: f64) -> Result<Vec<f64>> {
    match values {
        Some(values) => {
            check_len(name, values.len(), n_columns)?;
            if values.iter().any(|v| !v.is_finite()) {
                bail!("{} contains a non-finite value", name);
            }
            Ok(values.to_vec())
        }
        None => Ok(vec![default; n_columns]),
    }
}

fn check_len(name: &str, len: usize, n_columns: usize) -> Result<()> {
    if len != n_columns {
        bail!("{} has {} values for {} columns", name, len, n_columns);
    }
    Ok(())
}

fn check_scale(scale: f64) -> Result<()> {
    if scale == 0.0 {
        bail!("scale contains a zero entry");
    }
    Ok(())
}
