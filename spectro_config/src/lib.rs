#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and offline dataset schema for the spectro host.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `dataset` enforces the CSV layout shared with the training scripts so the
//!   live feature width never drifts from what the models were fit on.
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod dataset;

pub use dataset::{
    DatasetRow, DatasetSummary, dataset_header, juice_base, load_dataset_csv,
    normalize_concentration,
};

/// Number of optical channels per frame. Fixed by the AS7343 firmware and the dataset schema.
pub const CHANNELS: usize = 12;

/// Tag the firmware prints in front of its sorted 12-channel dump.
pub const DEFAULT_FRAME_TAG: &str = "SORTED(405-855nm):";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Serial {
    /// Device path, e.g. "/dev/ttyUSB0" or "COM3".
    pub port: String,
    /// Must match the firmware's `Serial.begin(...)`.
    pub baud: u32,
    /// Per-read timeout; an elapsed timeout is an empty read.
    pub read_timeout_ms: u64,
    /// Opening the port resets most boards; wait this long before reading.
    pub settle_ms: u64,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
            read_timeout_ms: 1000,
            settle_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrameConvention {
    /// Comma-separated numbers, any numeric literal, optional `TAG:` prefix.
    #[default]
    Untagged,
    /// Fixed literal tag followed by comma-separated integers.
    Tagged,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FrameCfg {
    pub convention: FrameConvention,
    /// Literal prefix required when `convention = "tagged"`.
    pub tag: String,
}

impl Default for FrameCfg {
    fn default() -> Self {
        Self {
            convention: FrameConvention::Untagged,
            tag: DEFAULT_FRAME_TAG.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sampling {
    /// Frames averaged into one sample.
    pub reads_per_sample: usize,
    /// Abandon a partial cycle after this long without an accepted frame (0 disables).
    pub idle_reset_ms: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            reads_per_sample: 5,
            idle_reset_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Models {
    /// Juice-type bundle (produced by the juice training step).
    pub juice: PathBuf,
    /// Concentration bundle (produced by the concentration training step).
    pub concentration: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Reply {
    /// Append `JUICE_CONF` / `CONC_CONF` when the classifier exposes probabilities.
    pub confidence: bool,
}

impl Default for Reply {
    fn default() -> Self {
        Self { confidence: true }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: Serial,
    #[serde(default)]
    pub frame: FrameCfg,
    #[serde(default)]
    pub sampling: Sampling,
    pub models: Models,
    #[serde(default)]
    pub reply: Reply,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse, validate, and anchor relative model paths at the config file's directory.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let mut cfg =
        load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    if let Some(dir) = path.parent() {
        cfg.resolve_relative_to(dir);
    }
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 60_000 {
            eyre::bail!("serial.read_timeout_ms must be in [1, 60000]");
        }
        if self.serial.settle_ms > 60_000 {
            eyre::bail!("serial.settle_ms is unreasonably large (>60s)");
        }

        // Frame
        if self.frame.convention == FrameConvention::Tagged {
            let tag = self.frame.tag.trim();
            if tag.is_empty() {
                eyre::bail!("frame.tag must not be empty for the tagged convention");
            }
            if !tag.ends_with(':') {
                eyre::bail!("frame.tag must end with ':' (got {tag:?})");
            }
        }

        // Sampling
        if self.sampling.reads_per_sample == 0 {
            eyre::bail!("sampling.reads_per_sample must be >= 1");
        }
        if self.sampling.reads_per_sample > 1000 {
            eyre::bail!("sampling.reads_per_sample is unreasonably large (>1000)");
        }
        if self.sampling.idle_reset_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("sampling.idle_reset_ms is unreasonably large (>24h)");
        }

        // Models
        if self.models.juice.as_os_str().is_empty() {
            eyre::bail!("models.juice must name the juice bundle path");
        }
        if self.models.concentration.as_os_str().is_empty() {
            eyre::bail!("models.concentration must name the concentration bundle path");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly (got {rot:?})");
        }

        Ok(())
    }

    /// Rebase relative bundle paths onto `dir`; absolute paths are left alone.
    pub fn resolve_relative_to(&mut self, dir: &Path) {
        for p in [&mut self.models.juice, &mut self.models.concentration] {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[models]
juice = "models/juice.json"
concentration = "models/conc.json"
"#;

    #[test]
    fn defaults_fill_optional_sections() {
        let cfg = load_toml(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.serial.baud, 115_200);
        assert_eq!(cfg.sampling.reads_per_sample, 5);
        assert_eq!(cfg.frame.convention, FrameConvention::Untagged);
        assert_eq!(cfg.frame.tag, DEFAULT_FRAME_TAG);
        assert!(cfg.reply.confidence);
    }

    #[test]
    fn relative_model_paths_follow_config_dir() {
        let mut cfg = load_toml(MINIMAL).unwrap();
        cfg.resolve_relative_to(Path::new("/etc/spectro"));
        assert_eq!(cfg.models.juice, PathBuf::from("/etc/spectro/models/juice.json"));
        assert_eq!(
            cfg.models.concentration,
            PathBuf::from("/etc/spectro/models/conc.json")
        );
    }

    #[test]
    fn missing_models_section_is_a_parse_error() {
        assert!(load_toml("[serial]\nbaud = 9600\n").is_err());
    }
}
