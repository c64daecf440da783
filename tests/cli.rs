use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn run(dir: &Path, args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_script-output"))
        .current_dir(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // The child may exit before reading its input.
    let _ = child.stdin.take().unwrap().write_all(input.as_bytes());
    child.wait_with_output().unwrap()
}

#[test]
fn test_copies_input_to_stdout_and_data_files() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["a.dat", "run.log", "c.dat", "notes.txt"], "one\ntwo\nthree");

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "one\ntwo\nthree");
    assert_eq!(fs::read_to_string(dir.path().join("a.dat")).unwrap(), "one\ntwo\nthree");
    assert_eq!(fs::read_to_string(dir.path().join("c.dat")).unwrap(), "one\ntwo\nthree");
    assert!(!dir.path().join("notes.txt").exists());

    let log = fs::read_to_string(dir.path().join("run.log")).unwrap();
    assert!(log.starts_with("Logging to 1 file(s)\n  run.log\nCopying standard input to 2 data file(s)\n"));
    assert!(log.contains("Copied 3 lines"));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Copied 3 lines"));
    assert!(stderr.contains("notes.txt"));
}

#[test]
fn test_existing_files_are_skipped_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("kept.dat");
    fs::write(&data, "precious\n").unwrap();

    let output = run(dir.path(), &["--quiet", "kept.dat"], "new\n");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert_eq!(fs::read_to_string(&data).unwrap(), "precious\n");

    let output = run(dir.path(), &["--quiet", "--mode", "a", "kept.dat"], "new\n");
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&data).unwrap(), "precious\nnew\n");

    let output = run(dir.path(), &["--quiet", "--force", "kept.dat"], "fresh\n");
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&data).unwrap(), "fresh\n");
}

#[test]
fn test_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["-q", "--report", "out.dat", "out.log"], "a\nb\n");
    assert!(output.status.success());

    let log = fs::read_to_string(dir.path().join("out.log")).unwrap();
    let json_start = log.find('{').unwrap();
    let report: serde_json::Value = serde_json::from_str(&log[json_start..]).unwrap();
    assert_eq!(report["lines"], 2);
    assert_eq!(report["bytes"], 4);
    assert_eq!(report["data_files"][0], "out.dat");
    assert_eq!(report["log_files"][0], "out.log");
}

#[test]
fn test_open_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["-q", "--mode", "r+", "missing.dat"], "data\n");
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Could not open missing.dat with mode r+"));
}

#[test]
fn test_invalid_mode_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["--mode", "rw", "out.dat"], "");
    assert!(!output.status.success());
    assert!(!dir.path().join("out.dat").exists());
}
