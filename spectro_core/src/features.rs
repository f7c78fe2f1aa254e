//! Feature reconstruction. Must match the transforms the bundles were trained with.
//!
//! The numeric transform for each stage is named by the bundle's `preprocess`
//! tag; the concentration stage appends a one-hot block for the juice label
//! using the encoder fitted at training time.

use serde::Deserialize;

use crate::aggregator::Sample;
use crate::error::{Result, SpectroError};
use crate::frame::CHANNELS;

/// Divisor substituted when an L1 row sums to exactly zero.
pub const L1_EPSILON: f64 = 1e-12;

/// Numeric transform for the juice stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JuicePreprocess {
    Raw,
    L1,
}

impl JuicePreprocess {
    pub fn tag(self) -> &'static str {
        match self {
            JuicePreprocess::Raw => "raw",
            JuicePreprocess::L1 => "l1",
        }
    }

    pub fn output_width(self) -> usize {
        CHANNELS
    }
}

/// Numeric transform for the concentration stage (before the one-hot block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcentrationPreprocess {
    Raw,
    Mean,
}

impl ConcentrationPreprocess {
    pub fn tag(self) -> &'static str {
        match self {
            ConcentrationPreprocess::Raw => "raw",
            ConcentrationPreprocess::Mean => "mean",
        }
    }

    /// Width of the numeric part only.
    pub fn numeric_width(self) -> usize {
        match self {
            ConcentrationPreprocess::Raw => CHANNELS,
            ConcentrationPreprocess::Mean => 1,
        }
    }
}

/// Classifier input for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(v: Vec<f64>) -> Self {
        FeatureVector(v)
    }
}

/// One-hot encoder with a category order frozen at training time.
///
/// Transform only. Labels outside the fitted categories encode to all zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHotEncoder {
    categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn new(categories: Vec<String>) -> Result<Self> {
        if categories.is_empty() {
            return Err(SpectroError::Config(
                "one-hot encoder needs at least one category".into(),
            ));
        }
        for (i, c) in categories.iter().enumerate() {
            if categories[..i].contains(c) {
                return Err(SpectroError::Config(format!(
                    "one-hot encoder has duplicate category {c:?}"
                )));
            }
        }
        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    pub fn transform(&self, label: &str) -> Vec<f64> {
        self.categories
            .iter()
            .map(|c| if c == label { 1.0 } else { 0.0 })
            .collect()
    }
}

fn check_width(sample: &Sample) -> Result<()> {
    if sample.width() != CHANNELS {
        return Err(SpectroError::Feature(format!(
            "sample has {} channels, expected {CHANNELS}",
            sample.width()
        )));
    }
    Ok(())
}

/// Divide each element by the row sum; a zero sum uses [`L1_EPSILON`] instead.
pub fn l1_normalize(values: &[f64]) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    let divisor = if sum == 0.0 { L1_EPSILON } else { sum };
    values.iter().map(|v| v / divisor).collect()
}

pub fn channel_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn build_juice(sample: &Sample, mode: JuicePreprocess) -> Result<FeatureVector> {
    check_width(sample)?;
    let v = match mode {
        JuicePreprocess::Raw => sample.values().to_vec(),
        JuicePreprocess::L1 => l1_normalize(sample.values()),
    };
    Ok(FeatureVector(v))
}

pub fn build_concentration(
    sample: &Sample,
    juice_label: &str,
    encoder: &OneHotEncoder,
    mode: ConcentrationPreprocess,
) -> Result<FeatureVector> {
    check_width(sample)?;
    let mut v = match mode {
        ConcentrationPreprocess::Raw => sample.values().to_vec(),
        ConcentrationPreprocess::Mean => vec![channel_mean(sample.values())],
    };
    v.extend(encoder.transform(juice_label));
    Ok(FeatureVector(v))
}
