use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Simulator reference spectrum; the juice centroid below is its L1 profile.
const PROFILE: [f64; 12] = [
    914.0, 4652.0, 6628.0, 7001.0, 7123.0, 6999.0, 6400.0, 5300.0, 4100.0, 3000.0, 2000.0, 1033.0,
];

fn write_bundles(dir: &tempfile::TempDir) {
    let sum: f64 = PROFILE.iter().sum();
    let orange: Vec<f64> = PROFILE.iter().map(|v| v / sum).collect();
    let juice = json!({
        "format_version": 1,
        "stage": "juice",
        "preprocess": "l1",
        "classes": ["grape", "orange"],
        "classifier": { "kind": "nearest_centroid", "centroids": [vec![1.0 / 12.0; 12], orange] }
    });
    // [mean, one-hot(grape, orange)]; the simulated mean is ~4600.
    let conc = json!({
        "format_version": 1,
        "stage": "concentration",
        "preprocess": "mean",
        "classes": ["high", "low"],
        "juice_categories": ["grape", "orange"],
        "classifier": { "kind": "nearest_centroid", "centroids": [[5000.0, 0.0, 1.0], [500.0, 0.0, 1.0]] }
    });
    fs::write(dir.path().join("juice.json"), juice.to_string()).unwrap();
    fs::write(dir.path().join("conc.json"), conc.to_string()).unwrap();
}

// Build a minimal valid TOML config for sim mode
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[serial]
read_timeout_ms = 100
settle_ms = 0

[models]
juice = "juice.json"
concentration = "conc.json"
{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn spectro(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("spectro_cli").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check"], 0, "nearest_centroid", "stdout")]
#[case(&["run", "--sim", "--max-cycles", "2"], 0, "OUT: JUICE=orange;CONC=high", "stdout")]
#[case(&["run", "--sim", "--max-cycles", "1"], 0, "cycles: ok=1 failed=0", "stdout")]
#[case(&["run", "--max-cycles", "many"], 2, "invalid value", "stderr")]
#[case(&["dataset"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    write_bundles(&dir);
    let cfg = write_config(&dir, "");

    let assert = spectro(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn missing_bundle_names_artifact_and_training_step() {
    let dir = tempdir().unwrap();
    write_bundles(&dir);
    fs::remove_file(dir.path().join("conc.json")).unwrap();
    let cfg = write_config(&dir, "");

    spectro(&cfg)
        .arg("check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("conc.json"))
        .stderr(predicate::str::contains("train_concentration"));
}

#[test]
fn missing_bundle_stops_run_before_any_output() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    spectro(&cfg)
        .args(["run", "--sim", "--max-cycles", "1"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("OUT:").not());
}

#[rstest]
#[case("[sampling]\nreads_per_sample = 0\n")]
#[case("[frame]\nconvention = \"tagged\"\ntag = \"NOCOLON\"\n")]
#[case("[logging]\nrotation = \"weekly\"\n")]
fn invalid_config_exits_4(#[case] extra: &str) {
    let dir = tempdir().unwrap();
    write_bundles(&dir);
    let cfg = write_config(&dir, extra);

    spectro(&cfg)
        .arg("check")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let out = spectro(&cfg).arg("--json").arg("check").output().unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "BundleMissing");
    assert_eq!(v["details"]["producer"], "train_juice");
}

#[test]
fn tagged_sim_run_produces_replies() {
    let dir = tempdir().unwrap();
    write_bundles(&dir);
    let cfg = write_config(&dir, "[frame]\nconvention = \"tagged\"\n");

    spectro(&cfg)
        .args(["run", "--sim", "--max-cycles", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OUT: JUICE=orange;CONC=high"));
}

#[test]
fn json_run_prints_stats_object() {
    let dir = tempdir().unwrap();
    write_bundles(&dir);
    let cfg = write_config(&dir, "");

    let out = spectro(&cfg)
        .args(["--json", "run", "--sim", "--max-cycles", "1"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let stats_line = stdout.lines().find(|l| l.starts_with('{')).unwrap();
    let v: serde_json::Value = serde_json::from_str(stats_line).unwrap();
    assert_eq!(v["stats"]["cycles_ok"], 1);
}

#[test]
fn dataset_reports_label_counts() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let csv = dir.path().join("data.csv");
    let mut f = fs::File::create(&csv).unwrap();
    let chans: Vec<String> = (1..=12).map(|i| format!("avg_ch{i}")).collect();
    writeln!(f, "timestamp,juice_type,concentration,{}", chans.join(",")).unwrap();
    let vals = vec!["100"; 12].join(",");
    writeln!(f, "2024-01-01T00:00:00,apple1,high,{vals}").unwrap();
    writeln!(f, "2024-01-01T00:00:05,apple2,med,{vals}").unwrap();
    writeln!(f, "2024-01-01T00:00:10,grape,low,{vals}").unwrap();

    spectro(&cfg)
        .arg("dataset")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 rows"))
        .stdout(predicate::str::contains("apple=2"))
        .stdout(predicate::str::contains("medium=1"));
}

#[test]
fn dataset_reports_bad_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "time,juice,conc\n1,apple,high\n").unwrap();

    spectro(&cfg)
        .arg("dataset")
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}
