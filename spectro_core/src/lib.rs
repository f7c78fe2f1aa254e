#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Spectral juice classification (transport-agnostic).
//!
//! This crate turns a stream of text lines from a 12-channel optical sensor
//! into one `JUICE=..;CONC=..` reply per averaged sample. All I/O goes through
//! `spectro_traits::Transport`.
//!
//! ## Architecture
//!
//! - **Framing**: line → 12-value frame, two payload conventions (`frame` module)
//! - **Aggregation**: N frames → element-wise mean sample (`aggregator` module)
//! - **Features**: per-stage numeric transform plus one-hot juice label (`features` module)
//! - **Models**: closed classifier registry and versioned JSON bundles (`model`, `bundle`)
//! - **Inference**: juice stage then concentration stage (`pipeline` module)
//! - **Loop**: per-cycle failure boundary, idle reset, run stats (`orchestrator` module)
//!
//! Bundle problems are startup errors (`BundleError`); anything that goes wrong
//! inside a cycle is a `SpectroError` reported as an `ERROR=` reply.

pub mod aggregator;
pub mod bundle;
pub mod conversions;
pub mod error;
pub mod features;
pub mod frame;
pub mod mocks;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod reply;

pub use aggregator::{Accept, Aggregator, Sample};
pub use bundle::{BUNDLE_FORMAT_VERSION, ConcentrationBundle, JuiceBundle, LabelDecoder, Prediction, Stage};
pub use error::{BundleError, Result, SpectroError};
pub use features::{ConcentrationPreprocess, FeatureVector, JuicePreprocess, OneHotEncoder};
pub use frame::{CHANNELS, FramePolicy, RawFrame, parse_line};
pub use model::{CLASSIFIER_KINDS, Classifier, ClassifierSpec};
pub use orchestrator::{CycleState, Orchestrator, OrchestratorCfg, RunStats, StepOutcome};
pub use pipeline::{Classification, Pipeline};
