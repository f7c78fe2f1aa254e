//! Outbound reply lines.
//!
//! `JUICE=<label>;CONC=<label>[;JUICE_CONF=<x.xxx>][;CONC_CONF=<x.xxx>]`
//! on success, `ERROR=<kind>:<message>` on a failed cycle.

use crate::error::SpectroError;
use crate::pipeline::Classification;

/// Success reply. Confidence fields are appended only when `with_confidence`
/// is set and the stage produced one.
pub fn format_reply(c: &Classification, with_confidence: bool) -> String {
    let mut out = format!(
        "JUICE={};CONC={}",
        one_line(&c.juice.label),
        one_line(&c.concentration.label)
    );
    if with_confidence {
        if let Some(p) = c.juice.confidence {
            out.push_str(&format!(";JUICE_CONF={p:.3}"));
        }
        if let Some(p) = c.concentration.confidence {
            out.push_str(&format!(";CONC_CONF={p:.3}"));
        }
    }
    out
}

pub fn format_error(err: &SpectroError) -> String {
    format!("ERROR={}:{}", err.kind(), one_line(err.detail()))
}

/// Collapse line breaks so a reply is always exactly one line.
fn one_line(s: &str) -> String {
    s.split(['\r', '\n'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
