use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("thallo_cli").unwrap();
    cmd.env_remove("THALLO_API_URL");
    cmd
}

#[test]
fn parcel_command_orders_clicks() {
    let file = assert_fs::NamedTempFile::new("clicks.csv").unwrap();
    file.write_str("0.0,0.0\n1.0,1.0\n1.0,0.0\n0.0,1.0\n").unwrap();

    cli()
        .args(["parcel", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vertices: 4"))
        .stdout(predicate::str::contains("Area: 1.00000000"))
        .stdout(predicate::str::contains("Warning").not());
}

#[test]
fn parcel_command_writes_geojson() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("parcel.geojson");
    input
        .write_str(
            r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon",
            "coordinates":[[[-111.9,40.7],[-111.88,40.7],[-111.88,40.72],[-111.9,40.72],[-111.9,40.7]]]}}"#,
        )
        .unwrap();
    let output = dir.child("ring.geojson");

    cli()
        .args([
            "parcel",
            input.path().to_str().unwrap(),
            "--geojson",
            output.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vertices: 4"))
        .stdout(predicate::str::contains("Wrote"));

    output.assert(predicate::path::exists());
    output.assert(predicate::str::contains("Polygon"));
    dir.close().unwrap();
}

#[test]
fn parcel_command_needs_three_points() {
    let file = assert_fs::NamedTempFile::new("clicks.csv").unwrap();
    file.write_str("0.0,0.0\n1.0,1.0\n").unwrap();

    cli()
        .args(["parcel", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 3 points"));
}

#[test]
fn submit_rejects_incomplete_parcel_offline() {
    let file = assert_fs::NamedTempFile::new("clicks.csv").unwrap();
    file.write_str("0.0,0.0\n1.0,1.0\n").unwrap();

    cli()
        .args([
            "submit",
            "--name",
            "Sunrise Ridge",
            "--points",
            file.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 3 points"));
}

#[test]
fn submit_rejects_build_year_offline() {
    let file = assert_fs::NamedTempFile::new("clicks.csv").unwrap();
    file.write_str("0.0,0.0\n1.0,0.0\n1.0,1.0\n").unwrap();

    cli()
        .args([
            "submit",
            "--name",
            "Late",
            "--build-year",
            "2090",
            "--points",
            file.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("build year 2090"));
}

#[test]
fn submit_saves_draft() {
    let dir = assert_fs::TempDir::new().unwrap();
    let points = dir.child("clicks.csv");
    points.write_str("0.0,0.0\n").unwrap();
    let draft = dir.child("draft.json");

    cli()
        .args([
            "submit",
            "--name",
            "Canyon View",
            "--greywater",
            "--points",
            points.path().to_str().unwrap(),
            "--save-draft",
            draft.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Saved draft"));

    draft.assert(predicate::str::contains("\"greywater_recycling\": true"));
    dir.close().unwrap();
}

#[test]
fn submit_reports_unreachable_backend() {
    let file = assert_fs::NamedTempFile::new("clicks.csv").unwrap();
    file.write_str("0.0,0.0\n1.0,0.0\n1.0,1.0\n").unwrap();

    cli()
        .args([
            "--api-url",
            "http://127.0.0.1:9",
            "submit",
            "--name",
            "Nowhere",
            "--points",
            file.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not reach the backend"));
}

#[test]
fn watch_rejects_invalid_levers_offline() {
    cli()
        .args(["watch", "1", "--reduce", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unit reduction"));
}

#[test]
fn invalid_api_url_is_a_config_error() {
    cli()
        .args(["--api-url", "ftp://example.com", "watch", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn config_file_is_loaded() {
    let file = assert_fs::NamedTempFile::new("thallo.json").unwrap();
    file.write_str(r#"{"base_url": "not a url"}"#).unwrap();

    cli()
        .args(["--config", file.path().to_str().unwrap(), "watch", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("base_url must be an http(s) URL"));
}

#[test]
fn watch_flags_take_an_explicit_value() {
    cli()
        .args(["watch", "1", "--greywater", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
