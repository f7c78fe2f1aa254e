//! Model bundles: one immutable artifact per classification stage.
//!
//! A bundle is the JSON export of a training run:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "stage": "concentration",
//!   "preprocess": "mean",
//!   "classes": ["high", "low", "medium"],
//!   "juice_categories": ["apple", "grape", "orange"],
//!   "classifier": { "kind": "logistic_regression", "coef": [[...]], "intercept": [...] }
//! }
//! ```
//!
//! Everything is checked when the bundle is loaded: format version, stage,
//! preprocess tag (required, never defaulted), label count against the
//! classifier, and the classifier's input width against the width the
//! feature builder will produce. A bundle that loads is safe to run.

use std::path::Path;

use serde::Deserialize;
use serde::de::value::{Error as TagError, StrDeserializer};
use serde::de::{DeserializeOwned, IntoDeserializer};

use crate::error::{BundleError, Result, SpectroError};
use crate::features::{ConcentrationPreprocess, FeatureVector, JuicePreprocess, OneHotEncoder};
use crate::model::{Classifier, ClassifierSpec};

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Juice,
    Concentration,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Juice => "juice",
            Stage::Concentration => "concentration",
        }
    }

    /// Training step that writes this stage's bundle.
    pub fn producer(self) -> &'static str {
        match self {
            Stage::Juice => "train_juice",
            Stage::Concentration => "train_concentration",
        }
    }
}

/// Ordered class names; index `i` is the classifier's class `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDecoder {
    classes: Vec<String>,
}

impl LabelDecoder {
    pub fn new(classes: Vec<String>) -> std::result::Result<Self, String> {
        if classes.is_empty() {
            return Err("classes must not be empty".into());
        }
        for (i, c) in classes.iter().enumerate() {
            if c.trim().is_empty() {
                return Err(format!("class {i} has an empty name"));
            }
            if classes[..i].contains(c) {
                return Err(format!("duplicate class {c:?}"));
            }
        }
        Ok(Self { classes })
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes.get(index).map(String::as_str).ok_or_else(|| {
            SpectroError::Decode(format!(
                "class index {index} out of range for {} labels",
                self.classes.len()
            ))
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A decoded label with the top class probability, when the model has one.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: Option<f64>,
}

fn predict_with(
    stage: Stage,
    classifier: &dyn Classifier,
    labels: &LabelDecoder,
    features: &FeatureVector,
) -> Result<Prediction> {
    let idx = classifier.predict(features.values())?;
    let label = labels.decode(idx)?.to_string();
    // Probabilities are optional; a model that fails to produce them still predicts.
    let confidence = match classifier.predict_proba(features.values()) {
        Ok(Some(p)) => p.iter().copied().reduce(f64::max),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(stage = stage.name(), error = %e, "predict_proba unavailable");
            None
        }
    };
    Ok(Prediction {
        label,
        confidence: confidence.map(|c| c.clamp(0.0, 1.0)),
    })
}

fn check_shape(
    stage: Stage,
    classifier: &dyn Classifier,
    labels: &LabelDecoder,
    feature_width: usize,
) -> std::result::Result<(), BundleError> {
    if classifier.n_classes() != labels.len() {
        return Err(BundleError::Invalid {
            stage: stage.name(),
            message: format!(
                "{} classifier has {} classes but {} labels are listed",
                classifier.kind(),
                classifier.n_classes(),
                labels.len()
            ),
        });
    }
    if classifier.n_features() != feature_width {
        return Err(BundleError::Invalid {
            stage: stage.name(),
            message: format!(
                "{} classifier expects {} features, feature builder produces {}",
                classifier.kind(),
                classifier.n_features(),
                feature_width
            ),
        });
    }
    Ok(())
}

// ── Artifact file ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BundleFile {
    format_version: u32,
    stage: String,
    #[serde(default)]
    preprocess: Option<String>,
    classes: Vec<String>,
    #[serde(default)]
    juice_categories: Option<Vec<String>>,
    #[serde(default)]
    model_name: Option<String>,
    classifier: ClassifierSpec,
}

struct Parsed {
    file: BundleFile,
    preprocess: String,
    classifier: Box<dyn Classifier>,
    labels: LabelDecoder,
}

fn read_artifact(stage: Stage, path: &Path) -> std::result::Result<String, BundleError> {
    if !path.exists() {
        return Err(BundleError::Missing {
            stage: stage.name(),
            path: path.to_path_buf(),
            producer: stage.producer(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| BundleError::Io {
        stage: stage.name(),
        path: path.to_path_buf(),
        source,
    })
}

fn parse_artifact(stage: Stage, json: &str) -> std::result::Result<Parsed, BundleError> {
    let file: BundleFile = serde_json::from_str(json).map_err(|e| BundleError::Corrupt {
        stage: stage.name(),
        message: e.to_string(),
    })?;
    if file.format_version != BUNDLE_FORMAT_VERSION {
        return Err(BundleError::UnsupportedVersion {
            stage: stage.name(),
            found: file.format_version,
            expected: BUNDLE_FORMAT_VERSION,
        });
    }
    if !file.stage.trim().eq_ignore_ascii_case(stage.name()) {
        return Err(BundleError::StageMismatch {
            expected: stage.name(),
            found: file.stage.clone(),
        });
    }
    let preprocess = match file.preprocess.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_ascii_lowercase(),
        _ => return Err(BundleError::MissingPreprocess { stage: stage.name() }),
    };
    let invalid = |message: String| BundleError::Invalid {
        stage: stage.name(),
        message,
    };
    let labels = LabelDecoder::new(file.classes.clone()).map_err(invalid)?;
    let classifier = file.classifier.clone().build().map_err(invalid)?;
    Ok(Parsed {
        file,
        preprocess,
        classifier,
        labels,
    })
}

/// Map the normalized tag onto the stage's preprocess enum.
fn preprocess_mode<P: DeserializeOwned>(stage: Stage, tag: &str) -> std::result::Result<P, BundleError> {
    let de: StrDeserializer<'_, TagError> = tag.into_deserializer();
    P::deserialize(de).map_err(|e| BundleError::Invalid {
        stage: stage.name(),
        message: format!("preprocess: {e}"),
    })
}

// ── Juice stage ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct JuiceBundle {
    classifier: Box<dyn Classifier>,
    labels: LabelDecoder,
    preprocess: JuicePreprocess,
    model_name: Option<String>,
}

impl JuiceBundle {
    pub fn new(
        classifier: Box<dyn Classifier>,
        labels: LabelDecoder,
        preprocess: JuicePreprocess,
    ) -> std::result::Result<Self, BundleError> {
        check_shape(
            Stage::Juice,
            classifier.as_ref(),
            &labels,
            preprocess.output_width(),
        )?;
        Ok(Self {
            classifier,
            labels,
            preprocess,
            model_name: None,
        })
    }

    pub fn load(path: &Path) -> std::result::Result<Self, BundleError> {
        let json = read_artifact(Stage::Juice, path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, BundleError> {
        let stage = Stage::Juice;
        let parsed = parse_artifact(stage, json)?;
        let preprocess: JuicePreprocess = preprocess_mode(stage, &parsed.preprocess)?;
        if parsed.file.juice_categories.is_some() {
            return Err(BundleError::Invalid {
                stage: stage.name(),
                message: "juice bundle must not carry juice_categories".into(),
            });
        }
        let mut bundle = Self::new(parsed.classifier, parsed.labels, preprocess)?;
        bundle.model_name = parsed.file.model_name;
        Ok(bundle)
    }

    pub fn preprocess(&self) -> JuicePreprocess {
        self.preprocess
    }

    pub fn labels(&self) -> &LabelDecoder {
        &self.labels
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn feature_width(&self) -> usize {
        self.preprocess.output_width()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        predict_with(Stage::Juice, self.classifier(), &self.labels, features)
    }
}

// ── Concentration stage ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ConcentrationBundle {
    classifier: Box<dyn Classifier>,
    labels: LabelDecoder,
    preprocess: ConcentrationPreprocess,
    encoder: OneHotEncoder,
    model_name: Option<String>,
}

impl ConcentrationBundle {
    pub fn new(
        classifier: Box<dyn Classifier>,
        labels: LabelDecoder,
        preprocess: ConcentrationPreprocess,
        encoder: OneHotEncoder,
    ) -> std::result::Result<Self, BundleError> {
        check_shape(
            Stage::Concentration,
            classifier.as_ref(),
            &labels,
            preprocess.numeric_width() + encoder.width(),
        )?;
        Ok(Self {
            classifier,
            labels,
            preprocess,
            encoder,
            model_name: None,
        })
    }

    pub fn load(path: &Path) -> std::result::Result<Self, BundleError> {
        let json = read_artifact(Stage::Concentration, path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, BundleError> {
        let stage = Stage::Concentration;
        let parsed = parse_artifact(stage, json)?;
        let preprocess: ConcentrationPreprocess = preprocess_mode(stage, &parsed.preprocess)?;
        let categories = parsed
            .file
            .juice_categories
            .ok_or_else(|| BundleError::Invalid {
                stage: stage.name(),
                message: "concentration bundle is missing juice_categories (fitted encoder)"
                    .into(),
            })?;
        let encoder = OneHotEncoder::new(categories).map_err(|e| BundleError::Invalid {
            stage: stage.name(),
            message: e.detail().to_string(),
        })?;
        let mut bundle = Self::new(parsed.classifier, parsed.labels, preprocess, encoder)?;
        bundle.model_name = parsed.file.model_name;
        Ok(bundle)
    }

    pub fn preprocess(&self) -> ConcentrationPreprocess {
        self.preprocess
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    pub fn labels(&self) -> &LabelDecoder {
        &self.labels
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn feature_width(&self) -> usize {
        self.preprocess.numeric_width() + self.encoder.width()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        predict_with(Stage::Concentration, self.classifier(), &self.labels, features)
    }
}
