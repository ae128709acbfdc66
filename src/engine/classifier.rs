//! Binary classifiers evaluated on a scaled feature vector
//!
//! Supported artifact kinds:
//! - Logistic regression and linear SVM (shared linear decision function)
//! - Decision tree (flattened node arrays)
//! - Random forest (soft vote over decision trees)

use anyhow::{bail, Context, Result};
use ndarray::{Array1, ArrayView1};
use serde::Deserialize;

use crate::utils::math::{argmax, normalize_sum};

/// Node index marking "no child" in flattened tree arrays
const TREE_LEAF: i64 = -1;

/// A fitted classifier producing one discrete label per sample
pub trait Classifier: Send + Sync {
    /// Width of the input vector the model was fitted on
    fn n_features_in(&self) -> usize;

    /// Labels the model can emit, in model order
    fn classes(&self) -> &[i64];

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<i64>;
}

/// Serialized classifier, tagged by `kind`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    LogisticRegression(LinearArtifact),
    LinearSvc(LinearArtifact),
    DecisionTree(TreeArtifact),
    RandomForest(ForestArtifact),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearArtifact {
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub classes: Vec<i64>,
}

/// Flattened tree: node `i` splits on `feature[i] <= threshold[i]`
#[derive(Debug, Clone, Deserialize)]
pub struct TreeArtifact {
    pub n_features_in: usize,
    pub classes: Vec<i64>,
    #[serde(flatten)]
    pub nodes: TreeNodes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeNodes {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights (counts or fractions)
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForestArtifact {
    pub n_features_in: usize,
    pub classes: Vec<i64>,
    pub estimators: Vec<TreeNodes>,
}

/// Validated classifier
#[derive(Debug, Clone)]
pub enum ClassifierModel {
    Linear(LinearModel),
    Tree(DecisionTree),
    Forest(RandomForest),
}

impl ClassifierModel {
    pub fn from_artifact(artifact: ClassifierArtifact) -> Result<Self> {
        let model = match artifact {
            ClassifierArtifact::LogisticRegression(a) => {
                Self::Linear(LinearModel::new(a).context("logistic_regression")?)
            }
            ClassifierArtifact::LinearSvc(a) => Self::Linear(LinearModel::new(a).context("linear_svc")?),
            ClassifierArtifact::DecisionTree(a) => Self::Tree(DecisionTree::new(a)?),
            ClassifierArtifact::RandomForest(a) => Self::Forest(RandomForest::new(a)?),
        };
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::Tree(_) => "decision_tree",
            Self::Forest(_) => "random_forest",
        }
    }
}

impl Classifier for ClassifierModel {
    fn n_features_in(&self) -> usize {
        match self {
            Self::Linear(m) => m.n_features_in(),
            Self::Tree(m) => m.n_features_in(),
            Self::Forest(m) => m.n_features_in(),
        }
    }

    fn classes(&self) -> &[i64] {
        match self {
            Self::Linear(m) => m.classes(),
            Self::Tree(m) => m.classes(),
            Self::Forest(m) => m.classes(),
        }
    }

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<i64> {
        match self {
            Self::Linear(m) => m.predict(x),
            Self::Tree(m) => m.predict(x),
            Self::Forest(m) => m.predict(x),
        }
    }
}

/// Binary linear model: positive decision selects the second class
#[derive(Debug, Clone)]
pub struct LinearModel {
    coef: Array1<f64>,
    intercept: f64,
    classes: Vec<i64>,
}

impl LinearModel {
    pub fn new(artifact: LinearArtifact) -> Result<Self> {
        check_binary_classes(&artifact.classes)?;
        if artifact.coef.is_empty() {
            bail!("coef is empty");
        }
        if artifact.coef.iter().any(|c| !c.is_finite()) || !artifact.intercept.is_finite() {
            bail!("coefficients must be finite");
        }
        Ok(Self {
            coef: Array1::from(artifact.coef),
            intercept: artifact.intercept,
            classes: artifact.classes,
        })
    }

    pub fn decision_function(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        check_width(x.len(), self.coef.len())?;
        Ok(self.coef.dot(&x) + self.intercept)
    }
}

impl Classifier for LinearModel {
    fn n_features_in(&self) -> usize {
        self.coef.len()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<i64> {
        let score = self.decision_function(x)?;
        if !score.is_finite() {
            bail!("decision function is not finite");
        }
        let idx = if score > 0.0 { 1 } else { 0 };
        Ok(self.classes[idx])
    }
}

/// Single decision tree
#[derive(Debug, Clone)]
pub struct DecisionTree {
    n_features_in: usize,
    classes: Vec<i64>,
    nodes: TreeNodes,
}

impl DecisionTree {
    pub fn new(artifact: TreeArtifact) -> Result<Self> {
        check_binary_classes(&artifact.classes)?;
        validate_nodes(&artifact.nodes, artifact.n_features_in, artifact.classes.len())?;
        Ok(Self {
            n_features_in: artifact.n_features_in,
            classes: artifact.classes,
            nodes: artifact.nodes,
        })
    }

    pub fn predict_proba(&self, x: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
        check_width(x.len(), self.n_features_in)?;
        Ok(leaf_distribution(&self.nodes, x))
    }
}

impl Classifier for DecisionTree {
    fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<i64> {
        let proba = self.predict_proba(x)?;
        Ok(self.classes[argmax(&proba)])
    }
}

/// Ensemble of trees averaging their leaf distributions
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_features_in: usize,
    classes: Vec<i64>,
    trees: Vec<TreeNodes>,
}

impl RandomForest {
    pub fn new(artifact: ForestArtifact) -> Result<Self> {
        check_binary_classes(&artifact.classes)?;
        if artifact.estimators.is_empty() {
            bail!("random forest has no estimators");
        }
        for (idx, tree) in artifact.estimators.iter().enumerate() {
            validate_nodes(tree, artifact.n_features_in, artifact.classes.len())
                .with_context(|| format!("estimator {}", idx))?;
        }
        Ok(Self {
            n_features_in: artifact.n_features_in,
            classes: artifact.classes,
            trees: artifact.estimators,
        })
    }

    pub fn predict_proba(&self, x: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
        check_width(x.len(), self.n_features_in)?;
        let mut total = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in total.iter_mut().zip(leaf_distribution(tree, x)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(total.into_iter().map(|p| p / n).collect())
    }
}

impl Classifier for RandomForest {
    fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<i64> {
        let proba = self.predict_proba(x)?;
        Ok(self.classes[argmax(&proba)])
    }
}

/// Walk from the root to a leaf and return its normalized class weights.
/// Nodes must have passed `validate_nodes`.
///
/// Splits are evaluated at f32 precision: thresholds were fitted on f32
/// inputs, so a value that rounds onto a threshold belongs to the left child.
fn leaf_distribution(nodes: &TreeNodes, x: ArrayView1<'_, f64>) -> Vec<f64> {
    let mut node = 0usize;
    while nodes.children_left[node] != TREE_LEAF {
        let feature = nodes.feature[node] as usize;
        node = if f64::from(x[feature] as f32) <= nodes.threshold[node] {
            nodes.children_left[node] as usize
        } else {
            nodes.children_right[node] as usize
        };
    }
    let mut dist = nodes.value[node].clone();
    normalize_sum(&mut dist);
    dist
}

fn validate_nodes(nodes: &TreeNodes, n_features_in: usize, n_classes: usize) -> Result<()> {
    let n = nodes.children_left.len();
    if n == 0 {
        bail!("tree has no nodes");
    }
    if nodes.children_right.len() != n
        || nodes.feature.len() != n
        || nodes.threshold.len() != n
        || nodes.value.len() != n
    {
        bail!("tree node arrays have inconsistent lengths");
    }

    for i in 0..n {
        let (left, right) = (nodes.children_left[i], nodes.children_right[i]);
        if left == TREE_LEAF || right == TREE_LEAF {
            if left != right {
                bail!("node {} has exactly one child", i);
            }
            let weights = &nodes.value[i];
            if weights.len() != n_classes {
                bail!("leaf {} has {} class weights, expected {}", i, weights.len(), n_classes);
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                bail!("leaf {} has invalid class weights", i);
            }
            continue;
        }

        // Children always come after their parent, which rules out cycles
        for child in [left, right] {
            if child <= i as i64 || child >= n as i64 {
                bail!("node {} has out-of-order child {}", i, child);
            }
        }
        let feature = nodes.feature[i];
        if feature < 0 || feature as usize >= n_features_in {
            bail!("node {} splits on feature {} of {}", i, feature, n_features_in);
        }
        if nodes.threshold[i].is_nan() {
            bail!("node {} has a NaN threshold", i);
        }
    }
    Ok(())
}

fn check_binary_classes(classes: &[i64]) -> Result<()> {
    if classes.len() != 2 {
        bail!("expected a binary classifier, got {} classes", classes.len());
    }
    if classes[0] == classes[1] {
        bail!("duplicate class label {}", classes[0]);
    }
    Ok(())
}

fn check_width(got: usize, expected: usize) -> Result<()> {
    if got != expected {
        bail!("input has {} features, model expects {}", got, expected);
    }
    Ok(())
}
