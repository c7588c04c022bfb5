//! File input and output helpers for parcel and project data.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};

use crate::geometry::{Point, Ring};

pub mod project;

/// Reads a file to string.
pub fn read_to_string(path: &str) -> io::Result<String> {
    let mut buffer = String::new();
    File::open(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Writes a string to a file, replacing its contents.
pub fn write_string(path: &str, contents: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())
}

/// Reads all lines of a file.
pub fn read_lines(path: &str) -> io::Result<Vec<String>> {
    BufReader::new(File::open(path)?).lines().collect()
}

/// Reads `lon,lat` pairs, one per line. Blank lines and `#` comments are skipped.
pub fn read_points_csv(path: &str) -> io::Result<Vec<Point>> {
    let lines = read_lines(path)?;
    let mut pts = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() != 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: expected lon,lat", idx + 1),
            ));
        }
        let mut coords = [0.0; 2];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part.trim().parse::<f64>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line {}: {}", idx + 1, e),
                )
            })?;
        }
        let p = Point::from(coords);
        if !p.is_finite() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: coordinates must be finite", idx + 1),
            ));
        }
        pts.push(p);
    }
    Ok(pts)
}

/// Writes the ring as a GeoJSON Feature with a Polygon geometry.
pub fn write_ring_geojson(path: &str, ring: &Ring) -> io::Result<()> {
    let feature = geojson::Feature {
        bbox: None,
        geometry: Some(ring.to_geometry()),
        id: None,
        properties: None,
        foreign_members: None,
    };
    write_string(path, &geojson::GeoJson::Feature(feature).to_string())
}

/// Reads the exterior ring vertices of the first Polygon in a GeoJSON file.
///
/// Accepts a bare geometry, a Feature or a FeatureCollection. The closing
/// duplicate point is dropped.
pub fn read_parcel_geojson(path: &str) -> io::Result<Vec<Point>> {
    let contents = read_to_string(path)?;
    let gj: geojson::GeoJson = contents
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let geometries: Vec<geojson::Geometry> = match gj {
        geojson::GeoJson::Geometry(g) => vec![g],
        geojson::GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        geojson::GeoJson::FeatureCollection(fc) => {
            fc.features.into_iter().filter_map(|f| f.geometry).collect()
        }
    };
    for geometry in geometries {
        if let geojson::Value::Polygon(rings) = geometry.value {
            let Some(exterior) = rings.into_iter().next() else {
                continue;
            };
            let mut pts = Vec::with_capacity(exterior.len());
            for pos in exterior {
                if pos.len() < 2 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "position needs two coordinates",
                    ));
                }
                pts.push(Point::new(pos[0], pos[1]));
            }
            if pts.len() > 1 && pts.first() == pts.last() {
                pts.pop();
            }
            return Ok(pts);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "no Polygon geometry found",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::compute_ring;

    #[test]
    fn csv_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pts.csv");
        let path = path.to_str().unwrap();
        write_string(path, "# parcel\n-111.70,41.74\n\n-111.69, 41.74\n-111.69,41.75\n").unwrap();
        let pts = read_points_csv(path).unwrap();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[1], Point::new(-111.69, 41.74));
    }

    #[test]
    fn csv_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pts.csv");
        let path = path.to_str().unwrap();
        write_string(path, "1.0,2.0\n3.0\n").unwrap();
        let err = read_points_csv(path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn geojson_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcel.geojson");
        let path = path.to_str().unwrap();
        let ring = compute_ring(&[
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ])
        .unwrap();
        write_ring_geojson(path, &ring).unwrap();
        let pts = read_parcel_geojson(path).unwrap();
        assert_eq!(pts, ring.vertices());
    }
}
