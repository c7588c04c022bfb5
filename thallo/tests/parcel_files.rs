use assert_fs::prelude::*;
use predicates::prelude::*;
use thallo::{
    geometry::{compute_ring, Point},
    io::{project::write_draft_json, read_parcel_geojson, read_points_csv, write_ring_geojson},
    parcel::Parcel,
    ProjectDraft,
};

#[test]
fn csv_clicks_to_geojson_parcel() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("clicks.csv");
    // clicked in bowtie order
    input
        .write_str("-111.90,40.70\n-111.88,40.72\n-111.88,40.70\n-111.90,40.72\n")
        .unwrap();
    let output = dir.child("parcel.geojson");

    let pts = read_points_csv(input.path().to_str().unwrap()).unwrap();
    let parcel = Parcel::from_points(&pts).unwrap();
    assert!(parcel.boundary.is_simple());
    write_ring_geojson(output.path().to_str().unwrap(), &parcel.boundary).unwrap();

    output.assert(predicate::str::contains("\"Polygon\""));
    let back = read_parcel_geojson(output.path().to_str().unwrap()).unwrap();
    assert_eq!(back.len(), 4);
    assert_eq!(compute_ring(&back).as_ref(), Some(&parcel.boundary));
    dir.close().unwrap();
}

#[test]
fn parcel_from_feature_collection() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("parcels.geojson");
    file.write_str(
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[0,0]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[2,0],[2,1],[0,1],[0,0]]]}}
        ]}"#,
    )
    .unwrap();
    let pts = read_parcel_geojson(file.path().to_str().unwrap()).unwrap();
    assert_eq!(pts.len(), 4);
    let parcel = Parcel::from_points(&pts).unwrap();
    assert!((parcel.area() - 2.0).abs() < 1e-12);
    dir.close().unwrap();
}

#[test]
fn two_points_are_not_a_parcel() {
    let pts = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
    let err = Parcel::from_points(&pts).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn draft_file_is_written() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("draft.json");
    let mut draft = ProjectDraft::new("Sunrise Ridge", 500, 2028);
    draft.points.push(Point::new(-111.9, 40.7));
    write_draft_json(file.path().to_str().unwrap(), &draft).unwrap();
    file.assert(predicate::path::exists());
    file.assert(predicate::str::contains("Sunrise Ridge"));
    dir.close().unwrap();
}
