//! Runs the built binary and checks exit codes, the stderr error line and
//! that failed runs leave no output behind.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn eoc_merge(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_eoc_merge"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .arg("-q")
        .args(args)
        .output()
        .unwrap()
}

fn last_stderr_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .last()
        .unwrap_or_default()
        .to_string()
}

#[test]
fn test_missing_input_fails_with_kind() {
    let dir = tempdir().unwrap();
    let output = eoc_merge(dir.path(), &["eoc", "missing.csv", "out.csv"]);

    assert_eq!(output.status.code(), Some(1));
    let line = last_stderr_line(&output);
    assert!(
        line.starts_with("error: SourceNotFoundError: "),
        "stderr: {}",
        line
    );
    assert!(line.contains("missing.csv"));
    assert!(!dir.path().join("out.csv").exists());
}

#[test]
fn test_negative_error_value_fails_without_output() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("run.tsv"), "1.0\t0.1\n0.5\t-1\n").unwrap();
    let output = eoc_merge(
        dir.path(),
        &["eoc", "run.tsv", "out.tsv", "--axis", "h", "--quantities", "q"],
    );

    assert_eq!(output.status.code(), Some(1));
    let line = last_stderr_line(&output);
    assert!(
        line.starts_with("error: InvalidMeasurementError: run.tsv:2"),
        "stderr: {}",
        line
    );
    assert!(!dir.path().join("out.tsv").exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_merge_writes_table_and_plot() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.csv"), "refine,q\n0,0.1\n1,0.025\n").unwrap();
    fs::write(dir.path().join("b.csv"), "refine,q\n0,0.1\n1,0.05\n").unwrap();
    let output = eoc_merge(
        dir.path(),
        &[
            "merge", "a.csv", "b.csv", "A", "B", "--quantities", "q", "--delimiter", ",",
            "--header", "--caption", "A vs B", "--out-prefix", "cmp",
        ],
    );

    assert!(output.status.success(), "stderr: {}", last_stderr_line(&output));
    assert_eq!(
        fs::read_to_string(dir.path().join("cmp.csv")).unwrap(),
        "refine,q_A,q_B\n0,0.1,0.1\n1,0.025,0.05\n"
    );
    assert!(dir.path().join("cmp.tex").exists());
}
