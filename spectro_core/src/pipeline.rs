//! Two-stage inference: juice type, then concentration conditioned on it.

use std::path::Path;

use crate::aggregator::Sample;
use crate::bundle::{ConcentrationBundle, JuiceBundle, Prediction};
use crate::error::{Report, Result};
use crate::features;

/// Both stage predictions for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub juice: Prediction,
    pub concentration: Prediction,
}

/// Owns both bundles. Built once at startup and shared read-only afterwards.
#[derive(Debug)]
pub struct Pipeline {
    juice: JuiceBundle,
    concentration: ConcentrationBundle,
}

impl Pipeline {
    pub fn new(juice: JuiceBundle, concentration: ConcentrationBundle) -> Self {
        Self {
            juice,
            concentration,
        }
    }

    /// Load both stage bundles eagerly. Any failure is a startup error; the
    /// report wraps the typed [`BundleError`](crate::error::BundleError).
    pub fn load(juice: &Path, concentration: &Path) -> std::result::Result<Self, Report> {
        let juice = JuiceBundle::load(juice)?;
        let concentration = ConcentrationBundle::load(concentration)?;
        tracing::info!(
            juice_kind = juice.classifier().kind(),
            juice_preprocess = juice.preprocess().tag(),
            conc_kind = concentration.classifier().kind(),
            conc_preprocess = concentration.preprocess().tag(),
            "model bundles loaded"
        );
        Ok(Self::new(juice, concentration))
    }

    pub fn juice(&self) -> &JuiceBundle {
        &self.juice
    }

    pub fn concentration(&self) -> &ConcentrationBundle {
        &self.concentration
    }

    pub fn classify(&self, sample: &Sample) -> Result<Classification> {
        let jf = features::build_juice(sample, self.juice.preprocess())?;
        let juice = self.juice.predict(&jf)?;

        let cf = features::build_concentration(
            sample,
            &juice.label,
            self.concentration.encoder(),
            self.concentration.preprocess(),
        )?;
        let concentration = self.concentration.predict(&cf)?;

        tracing::debug!(
            juice = %juice.label,
            concentration = %concentration.label,
            "sample classified"
        );
        Ok(Classification {
            juice,
            concentration,
        })
    }
}
