use std::path::PathBuf;

use thiserror::Error;

/// Failures inside one acquisition cycle. None of these may stop the loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpectroError {
    #[error("feature build failed: {0}")]
    Feature(String),
    #[error("classifier failed: {0}")]
    Classifier(String),
    #[error("label decode failed: {0}")]
    Decode(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl SpectroError {
    /// Category emitted in `ERROR=<kind>:<message>` replies.
    pub fn kind(&self) -> &'static str {
        match self {
            SpectroError::Feature(_) => "FeatureError",
            SpectroError::Classifier(_) => "ClassifierError",
            SpectroError::Decode(_) => "DecodeError",
            SpectroError::Transport(_) => "TransportError",
            SpectroError::Config(_) => "ConfigError",
        }
    }

    /// Message without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            SpectroError::Feature(m)
            | SpectroError::Classifier(m)
            | SpectroError::Decode(m)
            | SpectroError::Transport(m)
            | SpectroError::Config(m) => m,
        }
    }
}

/// Startup-time bundle problems. Always fatal.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("missing {stage} bundle at {}; run {producer} first", .path.display())]
    Missing {
        stage: &'static str,
        path: PathBuf,
        producer: &'static str,
    },
    #[error("read {stage} bundle {}: {source}", .path.display())]
    Io {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt {stage} bundle: {message}")]
    Corrupt { stage: &'static str, message: String },
    #[error("unsupported {stage} bundle format_version {found} (expected {expected})")]
    UnsupportedVersion {
        stage: &'static str,
        found: u32,
        expected: u32,
    },
    #[error("{stage} bundle has no preprocess tag; re-export it with the preprocess mode used in training")]
    MissingPreprocess { stage: &'static str },
    #[error("bundle stage mismatch: expected {expected}, found {found}")]
    StageMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("invalid {stage} bundle: {message}")]
    Invalid { stage: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, SpectroError>;
pub use eyre::Report;
