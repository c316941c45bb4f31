//! End-to-end tests for the busdraft binary.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn write_fixture(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn valid_fixture() -> NamedTempFile {
    write_fixture(
        r#"{
            "version": 1,
            "bus": { "baud": 19200, "serialFormat": "8E1" },
            "devices": [{
                "name": "Boiler",
                "slaveId": 7,
                "id": "boiler",
                "dataPoints": [{
                    "id": "boiler.flow",
                    "name": "flow",
                    "function": 3,
                    "address": "0x10",
                    "numOfRegisters": 1,
                    "dataType": "uint16",
                    "scale": 1.0,
                    "unit": "m3/h"
                }]
            }]
        }"#,
    )
}

#[test]
fn test_validate_accepts_good_document() {
    // the hex address string is tolerated by loading but not by the wire
    // rules, so validate a normalized copy
    let fixture = valid_fixture();
    let out = NamedTempFile::new().unwrap();

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["normalize", fixture.path().to_str().unwrap(), "--out"])
        .arg(out.path())
        .assert()
        .success();

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["validate", out.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn test_validate_lists_every_problem() {
    let fixture = write_fixture(
        r#"{
            "bus": { "baud": 0, "serialFormat": "9N1" },
            "devices": [{ "name": "", "slaveId": 300 }]
        }"#,
    );

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["validate", fixture.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bus baud must be a positive integer"))
        .stderr(predicate::str::contains("Invalid serialFormat 9N1"))
        .stderr(predicate::str::contains("Device #1: name required"))
        .stderr(predicate::str::contains("slaveId 1-247"));
}

#[test]
fn test_validate_legacy_profile_rejects_function_16() {
    let fixture = write_fixture(
        r#"{
            "bus": { "baud": 9600, "serialFormat": "8N1" },
            "devices": [{
                "name": "Boiler",
                "slaveId": 1,
                "dataPoints": [{
                    "id": "boiler.mode",
                    "name": "mode",
                    "function": 16,
                    "address": 0,
                    "numOfRegisters": 2,
                    "dataType": "uint16",
                    "scale": 1
                }]
            }]
        }"#,
    );

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["validate", fixture.path().to_str().unwrap()])
        .assert()
        .success();

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["validate", fixture.path().to_str().unwrap(), "--legacy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("function 1-6"));
}

#[test]
fn test_normalize_canonicalizes_addresses_and_aliases() {
    let fixture = write_fixture(
        r#"{
            "bus": { "baud": 9600, "serialFormat": "8N1" },
            "devices": [{
                "name": "Pump",
                "slaveId": 3,
                "dataPoints": [{
                    "id": "pump.speed",
                    "name": "speed",
                    "function": 3,
                    "address": "0x1A",
                    "numOfRegisters": 1,
                    "dataType": 5,
                    "scale": 1,
                    "registerSlice": "lowbyte"
                }]
            }]
        }"#,
    );

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["normalize", fixture.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"address\": 26"))
        .stdout(predicate::str::contains("\"dataType\": \"uint16\""))
        .stdout(predicate::str::contains("\"registerSlice\": \"low_byte\""));
}

#[test]
fn test_show_renders_tree_and_filter() {
    let fixture = valid_fixture();

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["show", fixture.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("RS485 Bus @ 19200 baud 8E1"))
        .stdout(predicate::str::contains("Boiler (slave 7) [boiler]"))
        .stdout(predicate::str::contains("boiler.flow"));

    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["show", fixture.path().to_str().unwrap(), "--query", "nothing-matches"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Boiler").not());
}

#[test]
fn test_missing_file_is_a_clean_error() {
    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["validate", "/no/such/file.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_push_refuses_invalid_document() {
    let fixture = write_fixture(
        r#"{
            "bus": { "baud": 9600, "serialFormat": "8N1" },
            "devices": [{ "name": "Boiler", "slaveId": 300 }]
        }"#,
    );

    // validation fails before any connection attempt, so a dead URL is fine
    Command::cargo_bin("busdraft")
        .unwrap()
        .args(["push", "--url", "http://127.0.0.1:1"])
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to push"))
        .stderr(predicate::str::contains("slaveId 1-247"));
}
