use std::fs::File;
use std::io::Write;

use rstest::rstest;
use spectro_config::{DatasetSummary, dataset_header, load_dataset_csv};
use tempfile::tempdir;

fn row(ts: &str, juice: &str, conc: &str, base: f64) -> String {
    let mut fields = vec![ts.to_string(), juice.to_string(), conc.to_string()];
    fields.extend((0..12).map(|i| format!("{:.1}", base + i as f64)));
    fields.join(",")
}

#[rstest]
fn loads_rows_in_schema_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ref.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "{}", dataset_header().join(",")).unwrap();
    writeln!(f, "{}", row("2025-12-09T14:02:11", "apple1", "med", 100.0)).unwrap();
    writeln!(f, "{}", row("2025-12-09T14:03:40", "orange2", "hi", 200.0)).unwrap();
    drop(f);

    let rows = load_dataset_csv(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].channels[0], 100.0);
    assert_eq!(rows[0].channels[11], 111.0);
    assert_eq!(rows[0].juice_base(), "apple");
    assert_eq!(rows[1].concentration_label(), "high");

    let summary = DatasetSummary::from_rows(&rows);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.by_juice.get("orange"), Some(&1));
    assert_eq!(summary.by_concentration.get("medium"), Some(&1));
}

#[rstest]
fn rejects_wrong_channel_count_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.csv");
    let mut header = dataset_header();
    header.pop();
    std::fs::write(&path, format!("{}\n", header.join(","))).unwrap();

    let err = load_dataset_csv(&path).expect_err("11-channel header must be rejected");
    assert!(format!("{err}").contains("dataset CSV must have headers"));
}

#[rstest]
#[case("abc")]
#[case("NaN")]
fn rejects_non_numeric_channel(#[case] bad: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    let mut line = row("t", "grape", "low", 1.0);
    line = line.replacen(",3.0,", &format!(",{bad},"), 1);
    std::fs::write(&path, format!("{}\n{}\n", dataset_header().join(","), line)).unwrap();

    let err = load_dataset_csv(&path).expect_err("bad channel must be rejected");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}
