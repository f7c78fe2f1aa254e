//! Offline dataset schema shared with the training scripts.
//!
//! Expected headers:
//! timestamp,juice_type,concentration,avg_ch1,...,avg_ch12
//!
//! Example:
//! timestamp,juice_type,concentration,avg_ch1,...,avg_ch12
//! 2025-12-09T14:02:11,apple1,med,914.2,4652.0,...,1033.4
use std::collections::BTreeMap;
use std::path::Path;

use crate::CHANNELS;

/// One labeled, already-averaged sample row.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub timestamp: String,
    pub juice_type: String,
    pub concentration: String,
    pub channels: [f64; CHANNELS],
}

impl DatasetRow {
    /// Juice family used as the training label (`apple1` -> `apple`).
    pub fn juice_base(&self) -> String {
        juice_base(&self.juice_type)
    }

    pub fn concentration_label(&self) -> String {
        normalize_concentration(&self.concentration)
    }
}

/// Canonical header in column order.
pub fn dataset_header() -> Vec<String> {
    let mut h = vec![
        "timestamp".to_string(),
        "juice_type".to_string(),
        "concentration".to_string(),
    ];
    h.extend((1..=CHANNELS).map(|i| format!("avg_ch{i}")));
    h
}

/// Leading ASCII letters, lowercased; falls back to the trimmed lowercase input
/// when the name does not start with a letter.
pub fn juice_base(juice_type: &str) -> String {
    let jt = juice_type.trim().to_ascii_lowercase();
    let base: String = jt.chars().take_while(|c| c.is_ascii_lowercase()).collect();
    if base.is_empty() { jt } else { base }
}

/// Collapse the shorthand used while recording into `low` / `medium` / `high`.
pub fn normalize_concentration(raw: &str) -> String {
    let c = raw.trim().to_ascii_lowercase();
    match c.as_str() {
        "med" | "mid" => "medium".to_string(),
        "hi" | "h" => "high".to_string(),
        "lo" | "l" => "low".to_string(),
        _ => c,
    }
}

/// Per-label counts over a loaded dataset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub by_juice: BTreeMap<String, usize>,
    pub by_concentration: BTreeMap<String, usize>,
}

impl DatasetSummary {
    pub fn from_rows(rows: &[DatasetRow]) -> Self {
        let mut s = Self {
            rows: rows.len(),
            ..Self::default()
        };
        for r in rows {
            *s.by_juice.entry(r.juice_base()).or_default() += 1;
            *s.by_concentration
                .entry(r.concentration_label())
                .or_default() += 1;
        }
        s
    }
}

pub fn load_dataset_csv(path: &Path) -> eyre::Result<Vec<DatasetRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open dataset CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = dataset_header();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "dataset CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        // Header is line 1
        let line = idx + 2;
        let rec = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", line, e))?;
        if rec.len() != expected.len() {
            eyre::bail!(
                "invalid CSV row {}: expected {} fields, got {}",
                line,
                expected.len(),
                rec.len()
            );
        }
        let mut channels = [0.0f64; CHANNELS];
        for (i, slot) in channels.iter_mut().enumerate() {
            let field = &rec[3 + i];
            let v: f64 = field.parse().map_err(|_| {
                eyre::eyre!("invalid CSV row {}: avg_ch{} is not a number: {:?}", line, i + 1, field)
            })?;
            if !v.is_finite() {
                eyre::bail!("invalid CSV row {}: avg_ch{} is not finite", line, i + 1);
            }
            *slot = v;
        }
        rows.push(DatasetRow {
            timestamp: rec[0].to_string(),
            juice_type: rec[1].to_string(),
            concentration: rec[2].to_string(),
            channels,
        });
    }
    Ok(rows)
}
