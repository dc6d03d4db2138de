use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::tempdir;

#[test]
fn cli_writes_a_batch() {
    let temp_dir = tempdir().unwrap();
    let config = temp_dir.path().join("parameters.json");
    fs::write(
        &config,
        r#"{ "population": { "num_susceptible": 90, "num_infected": 10 } }"#,
    )
    .unwrap();
    let output_dir = temp_dir.path().join("out");

    let output = cargo_bin_cmd!("sirqis")
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(&output_dir)
        .args(["--num-runs", "3", "--num-days", "12", "--random-seed", "7"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .contains("Wrote 3 runs"));

    let batch_dir = output_dir.join("batch_00000");
    for run in ["run_00000.csv", "run_00001.csv", "run_00002.csv"] {
        let text = fs::read_to_string(batch_dir.join(run)).unwrap();
        assert!(text.starts_with("days,susceptible,infected,recovered,"));
        assert_eq!(text.lines().count(), 14);
    }
    assert!(batch_dir.join("parameters.json").is_file());
    assert!(batch_dir.join("average.csv").is_file());
}

#[test]
fn cli_runs_are_reproducible() {
    let temp_dir = tempdir().unwrap();
    let output_dir = temp_dir.path().join("out");
    for _ in 0..2 {
        cargo_bin_cmd!("sirqis")
            .arg("--output-dir")
            .arg(&output_dir)
            .args(["-n", "1", "-d", "20", "-r", "3", "--no-summary"])
            .assert()
            .success();
    }
    let first = fs::read_to_string(output_dir.join("batch_00000/run_00000.csv")).unwrap();
    let second = fs::read_to_string(output_dir.join("batch_00001/run_00000.csv")).unwrap();
    assert_eq!(first, second);
    assert!(!output_dir.join("batch_00001/average.csv").exists());
}

#[test]
fn cli_rejects_invalid_configuration() {
    let temp_dir = tempdir().unwrap();
    let config = temp_dir.path().join("parameters.json");
    fs::write(
        &config,
        r#"{ "quarantine": { "days_till_quarantine_distribution": [0.5, 0.25] } }"#,
    )
    .unwrap();

    let output = cargo_bin_cmd!("sirqis")
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(temp_dir.path().join("out"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr).unwrap().starts_with("error:"));
    assert!(!temp_dir.path().join("out").exists());
}
