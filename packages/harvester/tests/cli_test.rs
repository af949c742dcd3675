//! Exit codes of the command-line binary.

use std::process::Command;

use assert_cmd::prelude::*;
use cashpoints_harvester::store::Store;
use predicates::prelude::*;

fn harvester() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cashpoints-harvester"));
    for key in [
        "CASHPOINTS_API_URL",
        "CASHPOINTS_GEOCODER_URL",
        "CASHPOINTS_GEOCODER_KEY",
        "CASHPOINTS_RETRY_ATTEMPTS",
        "CASHPOINTS_RETRY_DELAY_SECS",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_missing_first_argument_exits_1() {
    harvester()
        .arg("towns")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Argument 1"));
}

#[test]
fn test_missing_second_argument_exits_2() {
    harvester()
        .args(["cashpoints", "towns.db"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Argument 2"));
}

#[test]
fn test_missing_input_file_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    harvester()
        .arg("postprocess")
        .arg(dir.path().join("absent.db"))
        .arg(dir.path().join("processed.db"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No such file"));
}

#[test]
fn test_empty_town_list_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let towns_db = dir.path().join("towns.db");
    Store::open(&towns_db).unwrap().create_town_tables().unwrap();

    harvester()
        .arg("cashpoints")
        .arg(&towns_db)
        .arg(dir.path().join("cashpoints.db"))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Empty input"));
}

#[test]
fn test_empty_towns_json_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let towns_json = dir.path().join("towns.json");
    std::fs::write(&towns_json, r#"{"data": []}"#).unwrap();

    harvester()
        .arg("towns")
        .arg(&towns_json)
        .arg(dir.path().join("towns.db"))
        .assert()
        .code(4);
}

#[test]
fn test_banks_without_output_exits_1() {
    harvester().arg("banks").assert().code(1);
}

#[test]
fn test_help_lists_stages() {
    harvester()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cashpoints"))
        .stdout(predicate::str::contains("postprocess"));
}
