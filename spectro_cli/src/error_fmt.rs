//! Human-readable error descriptions and structured JSON error formatting.

use spectro_core::error::{BundleError, SpectroError};
use spectro_core::model::CLASSIFIER_KINDS;
use spectro_serial::error::SerialError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BundleError>() {
        return match be {
            BundleError::Missing {
                stage,
                path,
                producer,
            } => format!(
                "What happened: The {stage} model bundle is missing ({}).\nLikely causes: {producer} has not been run yet, or [models].{stage} points at the wrong file.\nHow to fix: Run {producer} to produce the bundle, or fix the path in the config.",
                path.display()
            ),
            BundleError::Io { stage, path, source } => format!(
                "What happened: The {stage} model bundle at {} could not be read ({source}).\nLikely causes: File permissions or a path that is a directory.\nHow to fix: Check the file and rerun.",
                path.display()
            ),
            BundleError::Corrupt { stage, message } if message.contains("unknown variant") => {
                format!(
                    "What happened: The {stage} model bundle names an unsupported classifier ({message}).\nLikely causes: The model was exported from a newer or different training setup.\nHow to fix: Re-export with one of: {}.",
                    CLASSIFIER_KINDS.join(", ")
                )
            }
            BundleError::Corrupt { stage, message } => format!(
                "What happened: The {stage} model bundle is corrupt ({message}).\nLikely causes: Truncated file or manual edits.\nHow to fix: Re-export the bundle from training."
            ),
            BundleError::UnsupportedVersion {
                stage,
                found,
                expected,
            } => format!(
                "What happened: The {stage} model bundle has format_version {found}; this build reads {expected}.\nLikely causes: Bundle and host come from different releases.\nHow to fix: Re-export the bundle or upgrade the host."
            ),
            BundleError::MissingPreprocess { stage } => format!(
                "What happened: The {stage} model bundle does not record its preprocess mode.\nLikely causes: Exported by an older training script.\nHow to fix: Re-export it with the \"preprocess\" field set to the mode used in training."
            ),
            BundleError::StageMismatch { expected, found } => format!(
                "What happened: A {found} bundle was configured as the {expected} model.\nLikely causes: [models].juice and [models].concentration are swapped.\nHow to fix: Point each entry at the matching bundle."
            ),
            BundleError::Invalid { stage, message } => format!(
                "What happened: The {stage} model bundle is inconsistent ({message}).\nLikely causes: Classifier and feature settings come from different training runs.\nHow to fix: Re-export the bundle from a single training run."
            ),
        };
    }

    if let Some(SpectroError::Config(msg)) = err.downcast_ref::<SpectroError>() {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/spectro.toml for a sample."
        );
    }

    if let Some(se) = err.downcast_ref::<SerialError>() {
        return match se {
            SerialError::Open { port, message } => format!(
                "What happened: Could not open serial port {port} ({message}).\nLikely causes: Sensor unplugged, wrong device path, or no permission (dialout group).\nHow to fix: Check the cable and [serial].port, or pass --port."
            ),
            other => format!(
                "What happened: Serial link failed ({other}).\nLikely causes: Device reset or cable disconnected.\nHow to fix: Reconnect the sensor and rerun."
            ),
        };
    }

    // String-based heuristics for errors coming from the dataset loader
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("dataset csv must have headers") {
        return format!(
            "Invalid headers in dataset CSV. Expected '{}'.",
            spectro_config::dataset_header().join(",")
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 bundle, 4 config, 5 transport, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BundleError>().is_some() {
        return 3;
    }
    if let Some(SpectroError::Config(_)) = err.downcast_ref::<SpectroError>() {
        return 4;
    }
    if err.downcast_ref::<SerialError>().is_some() {
        return 5;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BundleError>() {
        return match be {
            BundleError::Missing { .. } => "BundleMissing",
            BundleError::Io { .. } => "BundleIo",
            BundleError::Corrupt { .. } => "BundleCorrupt",
            BundleError::UnsupportedVersion { .. } => "BundleVersion",
            BundleError::MissingPreprocess { .. } => "BundleMissingPreprocess",
            BundleError::StageMismatch { .. } => "BundleStageMismatch",
            BundleError::Invalid { .. } => "BundleInvalid",
        };
    }
    match exit_code_for_error(err) {
        4 => "Config",
        5 => "Transport",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(BundleError::Missing { stage, path, producer }) = err.downcast_ref::<BundleError>() {
        obj["details"] = json!({
            "stage": stage,
            "path": path.display().to_string(),
            "producer": producer,
        });
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_bundle_maps_to_exit_3_and_names_producer() {
        let err = eyre::Report::new(BundleError::Missing {
            stage: "juice",
            path: PathBuf::from("models/best_juice_model.json"),
            producer: "train_juice",
        });
        assert_eq!(exit_code_for_error(&err), 3);
        let h = humanize(&err);
        assert!(h.contains("train_juice"));
        assert!(h.contains("best_juice_model.json"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "BundleMissing");
        assert_eq!(v["details"]["producer"], "train_juice");
    }

    #[test]
    fn config_error_maps_to_exit_4() {
        let err = eyre::Report::new(SpectroError::Config("sampling.reads_per_sample must be >= 1".into()));
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).starts_with("What happened: Invalid configuration"));
    }

    #[test]
    fn open_failure_maps_to_exit_5() {
        let err = eyre::Report::new(SerialError::Open {
            port: "/dev/ttyUSB9".into(),
            message: "No such file or directory".into(),
        });
        assert_eq!(exit_code_for_error(&err), 5);
        assert!(humanize(&err).contains("/dev/ttyUSB9"));
    }

    #[test]
    fn unknown_kind_lists_supported_kinds() {
        let err = eyre::Report::new(BundleError::Corrupt {
            stage: "juice",
            message: "unknown variant `k_neighbors`".into(),
        });
        assert!(humanize(&err).contains("nearest_centroid"));
    }

    #[test]
    fn generic_errors_exit_1() {
        let err = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("something odd"));
    }
}
