//! Integration tests for all CLI commands
//!
//! Tests each command with real invocations.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a CLI command
fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gpx-stream"))
}

const RECORDS: &str = r#"{
    "waypoints": [
        {"latitude": 10.0, "longitude": 20.0, "name": "North"},
        {"latitude": -5.0, "longitude": 30.0, "name": "South"}
    ]
}"#;

const BOUNDS: &str = r#"<bounds minlat="-5.000000000000000" minlon="20.000000000000000" maxlat="10.000000000000000" maxlon="30.000000000000000"/>"#;

/// Write `content` to `name` inside `dir`
fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn create_gpx(dir: &TempDir, output: &Path, extra: &[&str]) {
    let records = write_file(dir, "records.json", RECORDS);
    cli()
        .arg("create")
        .arg(output)
        .arg("--records")
        .arg(&records)
        .args(extra)
        .assert()
        .success();
}

// ============ DETECT COMMAND TESTS ============

#[test]
fn test_detect_help() {
    cli()
        .arg("detect")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Check whether a file is GPX"));
}

#[test]
fn test_detect_gpx_file() {
    let dir = TempDir::new().unwrap();
    let input = write_file(
        &dir,
        "track.gpx",
        r#"<?xml version="1.0"?><gpx version="1.0"><metadata><name>Loop</name></metadata><wpt lat="1" lon="2"/></gpx>"#,
    );

    cli()
        .arg("detect")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("GPX 1.0"))
        .stdout(predicate::str::contains("NAME = Loop"));
}

#[test]
fn test_detect_not_gpx() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "notes.txt", "not xml!!!");

    cli()
        .arg("detect")
        .arg(&input)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("not GPX"));
}

#[test]
fn test_detect_json() {
    let dir = TempDir::new().unwrap();
    let input = write_file(
        &dir,
        "track.gpx",
        r#"<gpx version="1.1" xmlns:ogr="http://osgeo.org/gdal"><metadata><keywords>a, b</keywords></metadata></gpx>"#,
    );

    cli()
        .arg("detect")
        .arg("--json")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""validity": "valid""#))
        .stdout(predicate::str::contains(r#""uses_extensions": true"#))
        .stdout(predicate::str::contains(r#""version": "1.1""#));
}

#[test]
fn test_detect_missing_file() {
    cli()
        .arg("detect")
        .arg("does-not-exist.gpx")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to detect"));
}

#[test]
fn test_detect_broken_gpx_is_error() {
    let dir = TempDir::new().unwrap();
    let input = write_file(
        &dir,
        "broken.gpx",
        "<?xml version=\"1.0\"?>\n<gpx version=\"1.1\" version=\"1.0\"></gpx>",
    );

    cli()
        .arg("detect")
        .arg(&input)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("XML parsing of GPX file failed"));
}

#[test]
fn test_detect_with_config_limits() {
    let dir = TempDir::new().unwrap();
    let mut content = String::from("<?xml version=\"1.0\"?>\n<!--");
    content.push_str(&"x".repeat(4000));
    content.push_str("-->\n<gpx version=\"1.1\"/>");
    let input = write_file(&dir, "late.gpx", &content);
    let config = write_file(
        &dir,
        "config.toml",
        "[detect]\nchunk_size = 512\nmax_inconclusive_chunks = 2\n",
    );

    cli().arg("detect").arg(&input).assert().success();
    cli()
        .arg("--config")
        .arg(&config)
        .arg("detect")
        .arg(&input)
        .assert()
        .code(1);
}

// ============ CREATE COMMAND TESTS ============

#[test]
fn test_create_writes_bounds() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.gpx");
    create_gpx(&dir, &output, &["-O", "LINEFORMAT=LF"]);

    let content = fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("<?xml version=\"1.0\"?>\n<gpx version=\"1.1\""));
    assert!(content.contains(BOUNDS));
    assert!(content.contains("<name>North</name>"));

    cli().arg("detect").arg(&output).assert().success();
}

#[test]
fn test_create_to_stdout_has_no_bounds() {
    let dir = TempDir::new().unwrap();
    let records = write_file(&dir, "records.json", RECORDS);

    cli()
        .arg("create")
        .arg("-")
        .arg("--records")
        .arg(&records)
        .assert()
        .success()
        .stdout(predicate::str::contains("<wpt lat=\"10\" lon=\"20\">"))
        .stdout(predicate::str::contains("</gpx>"))
        .stdout(predicate::str::contains("<bounds").not());
}

#[test]
fn test_create_metadata_options() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("meta.gpx");
    create_gpx(
        &dir,
        &output,
        &["-O", "METADATA_NAME=Weekend", "-O", "METADATA_AUTHOR_EMAIL=me@example.com"],
    );

    cli()
        .arg("detect")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME = Weekend"))
        .stdout(predicate::str::contains("AUTHOR_EMAIL = me@example.com"));
}

#[test]
fn test_create_config_and_override() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("configured.gpx");
    let config = write_file(
        &dir,
        "config.toml",
        r#"
[writer]
line_ending = "CRLF"
creator = "Config Creator"

[writer.metadata]
NAME = "From config"
DESCRIPTION = "Kept"
"#,
    );
    let config_arg = config.to_string_lossy().to_string();
    create_gpx(
        &dir,
        &output,
        &["--config", &config_arg, "-O", "METADATA_NAME=From option"],
    );

    let content = fs::read_to_string(&output).unwrap();
    assert!(content.contains("creator=\"Config Creator\""));
    assert!(content.contains("<name>From option</name>\r\n"));
    assert!(content.contains("<desc>Kept</desc>\r\n"));
    assert!(content.contains(BOUNDS));
}

#[test]
fn test_create_refuses_existing_output() {
    let dir = TempDir::new().unwrap();
    let records = write_file(&dir, "records.json", RECORDS);
    let output = write_file(&dir, "existing.gpx", "keep me");

    cli()
        .arg("create")
        .arg(&output)
        .arg("--records")
        .arg(&records)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("delete"));

    assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");
}

#[test]
fn test_create_bad_option_syntax() {
    let dir = TempDir::new().unwrap();
    let records = write_file(&dir, "records.json", RECORDS);

    cli()
        .arg("create")
        .arg(dir.path().join("out.gpx"))
        .arg("--records")
        .arg(&records)
        .arg("-O")
        .arg("LINEFORMAT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn test_create_invalid_records() {
    let dir = TempDir::new().unwrap();
    let records = write_file(&dir, "records.json", r#"{"waypoints": "nope"}"#);
    let output = dir.path().join("out.gpx");

    cli()
        .arg("create")
        .arg(&output)
        .arg("--records")
        .arg(&records)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load records"));

    assert!(!output.exists());
}
