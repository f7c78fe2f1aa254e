//! Classifier registry.
//!
//! Bundles name their classifier by `kind`; each kind is a variant of the
//! closed [`ClassifierSpec`] enum holding the fitted parameters exported by
//! the training step. Unknown kinds fail while the bundle is deserialized,
//! i.e. at startup, never during inference.

use serde::Deserialize;

use crate::error::{Result, SpectroError};

/// Trained classifier over a fixed-width feature vector.
pub trait Classifier: std::fmt::Debug + Send + Sync {
    /// Registry name, as written in the bundle.
    fn kind(&self) -> &'static str;

    /// Feature width the model was fit on.
    fn n_features(&self) -> usize;

    fn n_classes(&self) -> usize;

    /// Index of the predicted class.
    fn predict(&self, x: &[f64]) -> Result<usize>;

    /// Per-class probabilities, or `None` when the model has no probabilistic output.
    fn predict_proba(&self, _x: &[f64]) -> Result<Option<Vec<f64>>> {
        Ok(None)
    }
}

/// Names accepted in a bundle's `classifier.kind`.
pub const CLASSIFIER_KINDS: &[&str] = &[
    "logistic_regression",
    "linear_svc",
    "rbf_svc",
    "random_forest",
    "gradient_boosting",
    "nearest_centroid",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierSpec {
    LogisticRegression(LinearModel),
    LinearSvc(LinearModel),
    RbfSvc(RbfSvc),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    NearestCentroid(NearestCentroid),
}

impl ClassifierSpec {
    /// Check parameter shapes and box the concrete model.
    pub fn build(self) -> std::result::Result<Box<dyn Classifier>, String> {
        Ok(match self {
            ClassifierSpec::LogisticRegression(m) => {
                m.check()?;
                Box::new(LogisticRegression(m))
            }
            ClassifierSpec::LinearSvc(m) => {
                m.check()?;
                Box::new(LinearSvc(m))
            }
            ClassifierSpec::RbfSvc(m) => {
                m.check()?;
                Box::new(m)
            }
            ClassifierSpec::RandomForest(m) => {
                m.check()?;
                Box::new(m)
            }
            ClassifierSpec::GradientBoosting(m) => {
                m.check()?;
                Box::new(m)
            }
            ClassifierSpec::NearestCentroid(m) => {
                m.check()?;
                Box::new(m)
            }
        })
    }
}

fn check_input(kind: &str, expected: usize, x: &[f64]) -> Result<()> {
    if x.len() != expected {
        return Err(SpectroError::Classifier(format!(
            "{kind}: got {} features, model expects {expected}",
            x.len()
        )));
    }
    if let Some(i) = x.iter().position(|v| !v.is_finite()) {
        return Err(SpectroError::Classifier(format!(
            "{kind}: feature {i} is not finite"
        )));
    }
    Ok(())
}

/// Index of the first maximum; errors on NaN scores.
fn argmax(kind: &str, scores: &[f64]) -> Result<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            return Err(SpectroError::Classifier(format!("{kind}: score {i} is NaN")));
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| SpectroError::Classifier(format!("{kind}: no class scores")))
}

fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_rows(name: &str, rows: &[Vec<f64>], width: usize) -> std::result::Result<(), String> {
    for (i, r) in rows.iter().enumerate() {
        if r.len() != width {
            return Err(format!("{name} row {i} has {} entries, expected {width}", r.len()));
        }
        if r.iter().any(|v| !v.is_finite()) {
            return Err(format!("{name} row {i} has non-finite entries"));
        }
    }
    Ok(())
}

// ── Linear models ────────────────────────────────────────────────────────────

/// `coef` is `[n_rows][n_features]`; a single row means a binary model whose
/// positive class is index 1.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearModel {
    fn check(&self) -> std::result::Result<(), String> {
        let width = self.coef.first().map_or(0, Vec::len);
        if self.coef.is_empty() || width == 0 {
            return Err("coef must be a non-empty matrix".into());
        }
        check_rows("coef", &self.coef, width)?;
        if self.intercept.len() != self.coef.len() {
            return Err(format!(
                "intercept has {} entries, coef has {} rows",
                self.intercept.len(),
                self.coef.len()
            ));
        }
        if self.coef.len() == 2 {
            return Err("two coef rows is ambiguous; binary models export a single row".into());
        }
        Ok(())
    }

    fn n_features(&self) -> usize {
        self.coef.first().map_or(0, Vec::len)
    }

    fn n_classes(&self) -> usize {
        if self.coef.len() == 1 { 2 } else { self.coef.len() }
    }

    fn decision(&self, x: &[f64]) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(w, b)| dot(w, x) + b)
            .collect()
    }
}

#[derive(Debug)]
pub struct LogisticRegression(LinearModel);

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn n_features(&self) -> usize {
        self.0.n_features()
    }

    fn n_classes(&self) -> usize {
        self.0.n_classes()
    }

    fn predict(&self, x: &[f64]) -> Result<usize> {
        let p = self
            .predict_proba(x)?
            .ok_or_else(|| SpectroError::Classifier("logistic_regression: no probabilities".into()))?;
        argmax(self.kind(), &p)
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Option<Vec<f64>>> {
        check_input(self.kind(), self.n_features(), x)?;
        let z = self.0.decision(x);
        let p = if z.len() == 1 {
            let p1 = sigmoid(z[0]);
            vec![1.0 - p1, p1]
        } else {
            softmax(&z)
        };
        Ok(Some(p))
    }
}

#[derive(Debug)]
pub struct LinearSvc(LinearModel);

impl Classifier for LinearSvc {
    fn kind(&self) -> &'static str {
        "linear_svc"
    }

    fn n_features(&self) -> usize {
        self.0.n_features()
    }

    fn n_classes(&self) -> usize {
        self.0.n_classes()
    }

    fn predict(&self, x: &[f64]) -> Result<usize> {
        check_input(self.kind(), self.n_features(), x)?;
        let z = self.0.decision(x);
        if z.len() == 1 {
            return Ok(usize::from(z[0] > 0.0));
        }
        argmax(self.kind(), &z)
    }
}

// ── RBF SVM (one-vs-one) ─────────────────────────────────────────────────────

/// Kernel SVM in scikit-learn's exported layout.
///
/// Support vectors are grouped by class (`n_support[c]` rows each, in class
/// order). `dual_coef` is `[n_classes - 1][n_sv]` and `intercept` holds one
/// entry per class pair `(i, j)`, `i < j`, in lexicographic order. Each pair
/// votes; the class with most votes wins, ties going to the lower index.
/// Binary models use the sign of the single decision function.
#[derive(Debug, Clone, Deserialize)]
pub struct RbfSvc {
    pub gamma: f64,
    pub support_vectors: Vec<Vec<f64>>,
    pub n_support: Vec<usize>,
    pub dual_coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl RbfSvc {
    fn check(&self) -> std::result::Result<(), String> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err("gamma must be a positive finite number".into());
        }
        let width = self.support_vectors.first().map_or(0, Vec::len);
        if width == 0 {
            return Err("support_vectors must be a non-empty matrix".into());
        }
        check_rows("support_vectors", &self.support_vectors, width)?;
        let n_classes = self.n_support.len();
        if n_classes < 2 {
            return Err("n_support must list at least two classes".into());
        }
        if self.n_support.iter().sum::<usize>() != self.support_vectors.len() {
            return Err(format!(
                "n_support sums to {}, but there are {} support vectors",
                self.n_support.iter().sum::<usize>(),
                self.support_vectors.len()
            ));
        }
        if self.dual_coef.len() != n_classes - 1 {
            return Err(format!(
                "dual_coef has {} rows, expected n_classes - 1 = {}",
                self.dual_coef.len(),
                n_classes - 1
            ));
        }
        check_rows("dual_coef", &self.dual_coef, self.support_vectors.len())?;
        let pairs = n_classes * (n_classes - 1) / 2;
        if self.intercept.len() != pairs {
            return Err(format!(
                "intercept has {} entries, expected one per class pair ({pairs})",
                self.intercept.len()
            ));
        }
        if self.intercept.iter().any(|v| !v.is_finite()) {
            return Err("intercept has non-finite entries".into());
        }
        Ok(())
    }

    fn kernel_row(&self, x: &[f64]) -> Vec<f64> {
        self.support_vectors
            .iter()
            .map(|sv| {
                let d2: f64 = sv.iter().zip(x).map(|(a, b)| (a - b) * (a - b)).sum();
                (-self.gamma * d2).exp()
            })
            .collect()
    }

    /// Start offset of each class's block of support vectors.
    fn class_starts(&self) -> Vec<usize> {
        self.n_support
            .iter()
            .scan(0, |acc, &n| {
                let start = *acc;
                *acc += n;
                Some(start)
            })
            .collect()
    }
}

impl Classifier for RbfSvc {
    fn kind(&self) -> &'static str {
        "rbf_svc"
    }

    fn n_features(&self) -> usize {
        self.support_vectors.first().map_or(0, Vec::len)
    }

    fn n_classes(&self) -> usize {
        self.n_support.len()
    }

    fn predict(&self, x: &[f64]) -> Result<usize> {
        check_input(self.kind(), self.n_features(), x)?;
        let k = self.kernel_row(x);
        let n_classes = self.n_classes();
        if n_classes == 2 {
            let z = dot(&self.dual_coef[0], &k) + self.intercept[0];
            return Ok(usize::from(z > 0.0));
        }

        let starts = self.class_starts();
        let block = |c: usize| starts[c]..starts[c] + self.n_support[c];
        let mut votes = vec![0.0f64; n_classes];
        let mut pair = 0;
        for i in 0..n_classes {
            for j in i + 1..n_classes {
                let (bi, bj) = (block(i), block(j));
                let z = dot(&self.dual_coef[j - 1][bi.clone()], &k[bi])
                    + dot(&self.dual_coef[i][bj.clone()], &k[bj])
                    + self.intercept[pair];
                votes[if z > 0.0 { i } else { j }] += 1.0;
                pair += 1;
            }
        }
        argmax(self.kind(), &votes)
    }
}

// ── Tree ensembles ───────────────────────────────────────────────────────────

/// Node arrays shared by every exported tree. A node is a leaf when
/// `children_left[i] < 0`; otherwise `x[feature[i]] <= threshold[i]` goes left.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNodes {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
}

impl TreeNodes {
    fn len(&self) -> usize {
        self.children_left.len()
    }

    fn is_leaf(&self, i: usize) -> bool {
        self.children_left[i] < 0
    }

    /// Validate structure; `value_len` is the length of the per-node value array.
    fn check(&self, n_features: usize, value_len: usize) -> std::result::Result<(), String> {
        let n = self.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            value_len,
        ]
        .iter()
        .any(|&l| l != n)
        {
            return Err("tree arrays have different lengths".into());
        }
        for i in 0..n {
            if self.is_leaf(i) {
                continue;
            }
            let (l, r) = (self.children_left[i], self.children_right[i]);
            // Children always follow their parent, which also rules out cycles.
            let idx = i as i64;
            if l <= idx || r <= idx || l as usize >= n || r as usize >= n {
                return Err(format!("node {i} has out-of-order children ({l}, {r})"));
            }
            let f = self.feature[i];
            if f < 0 || f as usize >= n_features {
                return Err(format!("node {i} splits on feature {f} (have {n_features})"));
            }
            if !self.threshold[i].is_finite() {
                return Err(format!("node {i} has a non-finite threshold"));
            }
        }
        Ok(())
    }

    fn leaf_for(&self, x: &[f64]) -> usize {
        let mut i = 0usize;
        while !self.is_leaf(i) {
            let f = self.feature[i] as usize;
            i = if x[f] <= self.threshold[i] {
                self.children_left[i] as usize
            } else {
                self.children_right[i] as usize
            };
        }
        i
    }
}

/// Classification tree: per-node class weights, only leaves are read.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSpec {
    #[serde(flatten)]
    pub nodes: TreeNodes,
    pub value: Vec<Vec<f64>>,
}

impl TreeSpec {
    fn check(&self, n_features: usize, n_classes: usize) -> std::result::Result<(), String> {
        self.nodes.check(n_features, self.value.len())?;
        for i in (0..self.nodes.len()).filter(|&i| self.nodes.is_leaf(i)) {
            let leaf = &self.value[i];
            if leaf.len() != n_classes {
                return Err(format!("leaf {i} has {} class weights, expected {n_classes}", leaf.len()));
            }
            if leaf.iter().any(|v| !v.is_finite() || *v < 0.0) || leaf.iter().sum::<f64>() <= 0.0 {
                return Err(format!("leaf {i} has invalid class weights"));
            }
        }
        Ok(())
    }

    fn leaf_distribution(&self, x: &[f64]) -> Vec<f64> {
        let leaf = &self.value[self.nodes.leaf_for(x)];
        let total: f64 = leaf.iter().sum();
        leaf.iter().map(|v| v / total).collect()
    }
}

/// Regression tree: one raw score per node, only leaves are read.
#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTree {
    #[serde(flatten)]
    pub nodes: TreeNodes,
    pub value: Vec<f64>,
}

impl RegressionTree {
    fn check(&self, n_features: usize) -> std::result::Result<(), String> {
        self.nodes.check(n_features, self.value.len())?;
        if let Some(i) = (0..self.nodes.len())
            .find(|&i| self.nodes.is_leaf(i) && !self.value[i].is_finite())
        {
            return Err(format!("leaf {i} has a non-finite value"));
        }
        Ok(())
    }

    fn score(&self, x: &[f64]) -> f64 {
        self.value[self.nodes.leaf_for(x)]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<TreeSpec>,
}

impl RandomForest {
    fn check(&self) -> std::result::Result<(), String> {
        if self.n_features == 0 || self.n_classes < 2 {
            return Err("random_forest needs n_features >= 1 and n_classes >= 2".into());
        }
        if self.trees.is_empty() {
            return Err("random_forest has no trees".into());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features, self.n_classes)
                .map_err(|e| format!("tree {t}: {e}"))?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, x: &[f64]) -> Result<usize> {
        let p = self
            .predict_proba(x)?
            .ok_or_else(|| SpectroError::Classifier("random_forest: no probabilities".into()))?;
        argmax(self.kind(), &p)
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Option<Vec<f64>>> {
        check_input(self.kind(), self.n_features, x)?;
        let mut acc = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            for (a, p) in acc.iter_mut().zip(tree.leaf_distribution(x)) {
                *a += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(Some(acc.into_iter().map(|a| a / n).collect()))
    }
}

/// Histogram gradient boosting.
///
/// `trees` is `[n_iter][n_scores]` where `n_scores` is 1 for a binary model
/// and `n_classes` otherwise. Raw score `k` is `baseline[k]` plus the leaf
/// value of tree `k` from every iteration; probabilities come from a sigmoid
/// (binary) or softmax over the raw scores.
#[derive(Debug, Clone, Deserialize)]
pub struct GradientBoosting {
    pub n_features: usize,
    pub n_classes: usize,
    pub baseline: Vec<f64>,
    pub trees: Vec<Vec<RegressionTree>>,
}

impl GradientBoosting {
    fn n_scores(&self) -> usize {
        if self.n_classes == 2 { 1 } else { self.n_classes }
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.n_features == 0 || self.n_classes < 2 {
            return Err("gradient_boosting needs n_features >= 1 and n_classes >= 2".into());
        }
        let n_scores = self.n_scores();
        if self.baseline.len() != n_scores || self.baseline.iter().any(|v| !v.is_finite()) {
            return Err(format!("baseline must hold {n_scores} finite values"));
        }
        if self.trees.is_empty() {
            return Err("gradient_boosting has no iterations".into());
        }
        for (it, round) in self.trees.iter().enumerate() {
            if round.len() != n_scores {
                return Err(format!(
                    "iteration {it} has {} trees, expected {n_scores}",
                    round.len()
                ));
            }
            for (k, tree) in round.iter().enumerate() {
                tree.check(self.n_features)
                    .map_err(|e| format!("iteration {it} tree {k}: {e}"))?;
            }
        }
        Ok(())
    }

    fn raw_scores(&self, x: &[f64]) -> Vec<f64> {
        let mut raw = self.baseline.clone();
        for round in &self.trees {
            for (r, tree) in raw.iter_mut().zip(round) {
                *r += tree.score(x);
            }
        }
        raw
    }
}

impl Classifier for GradientBoosting {
    fn kind(&self) -> &'static str {
        "gradient_boosting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, x: &[f64]) -> Result<usize> {
        let p = self
            .predict_proba(x)?
            .ok_or_else(|| SpectroError::Classifier("gradient_boosting: no probabilities".into()))?;
        argmax(self.kind(), &p)
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Option<Vec<f64>>> {
        check_input(self.kind(), self.n_features, x)?;
        let raw = self.raw_scores(x);
        let p = if raw.len() == 1 {
            let p1 = sigmoid(raw[0]);
            vec![1.0 - p1, p1]
        } else {
            softmax(&raw)
        };
        Ok(Some(p))
    }
}

// ── Nearest centroid ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NearestCentroid {
    pub centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    fn check(&self) -> std::result::Result<(), String> {
        if self.centroids.len() < 2 {
            return Err("nearest_centroid needs at least two centroids".into());
        }
        let width = self.centroids[0].len();
        if width == 0 {
            return Err("centroids must not be empty".into());
        }
        check_rows("centroids", &self.centroids, width)
    }
}

impl Classifier for NearestCentroid {
    fn kind(&self) -> &'static str {
        "nearest_centroid"
    }

    fn n_features(&self) -> usize {
        self.centroids.first().map_or(0, Vec::len)
    }

    fn n_classes(&self) -> usize {
        self.centroids.len()
    }

    fn predict(&self, x: &[f64]) -> Result<usize> {
        check_input(self.kind(), self.n_features(), x)?;
        let neg_dist: Vec<f64> = self
            .centroids
            .iter()
            .map(|c| -c.iter().zip(x).map(|(a, b)| (a - b) * (a - b)).sum::<f64>())
            .collect();
        argmax(self.kind(), &neg_dist)
    }
}
