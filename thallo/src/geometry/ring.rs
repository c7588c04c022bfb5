//! Closed parcel boundaries built from unordered user input.

use super::{centroid, polygon_area, Line, Point};

/// Closed sequence of points describing a polygon boundary.
///
/// The first point is repeated as the last one. Rings are only produced by
/// [`compute_ring`], so a `Ring` always holds at least four entries.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Ring {
    points: Vec<Point>,
}

impl Ring {
    /// All points of the ring including the closing duplicate.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Distinct vertices, without the closing duplicate.
    pub fn vertices(&self) -> &[Point] {
        &self.points[..self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of distinct vertices.
    pub fn vertex_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Returns `true` if the first and last points are equal.
    pub fn is_closed(&self) -> bool {
        self.points.first() == self.points.last()
    }

    /// Area enclosed by the ring in squared degrees.
    pub fn area(&self) -> f64 {
        polygon_area(self.vertices())
    }

    /// Iterator over the boundary edges.
    pub fn edges(&self) -> impl Iterator<Item = Line> + '_ {
        self.points.windows(2).map(|w| Line::new(w[0], w[1]))
    }

    /// Checks that no two non-adjacent edges touch.
    ///
    /// Angular ordering only guarantees this for input that is star-shaped
    /// around its centroid, so callers that accept arbitrary clicks can use
    /// this to flag a parcel that needs redrawing.
    pub fn is_simple(&self) -> bool {
        let edges: Vec<Line> = self.edges().collect();
        let n = edges.len();
        for i in 0..n {
            for j in (i + 2)..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                if edges[i].intersects(&edges[j]) {
                    return false;
                }
            }
        }
        true
    }

    /// GeoJSON polygon geometry with this ring as its exterior.
    pub fn to_geometry(&self) -> geojson::Geometry {
        let exterior = self.points.iter().map(|p| vec![p.x, p.y]).collect();
        geojson::Geometry::new(geojson::Value::Polygon(vec![exterior]))
    }
}

/// Orders `points` angularly around their centroid and closes the ring.
///
/// Returns `None` for fewer than three points. Points with equal angles keep
/// their input order; a point sitting exactly on the centroid is treated as
/// angle zero.
pub fn compute_ring(points: &[Point]) -> Option<Ring> {
    if points.len() < 3 {
        return None;
    }
    let c = centroid(points)?;
    let mut keyed: Vec<(f64, Point)> = points
        .iter()
        .map(|p| {
            let angle = if p.x == c.x && p.y == c.y {
                0.0
            } else {
                (p.y - c.y).atan2(p.x - c.x)
            };
            (angle, *p)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut ordered: Vec<Point> = keyed.into_iter().map(|(_, p)| p).collect();
    ordered.push(ordered[0]);
    Some(Ring { points: ordered })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn scrambled(points: Vec<Point>) -> Vec<Point> {
        // deterministic interleave: even indices forward, odd indices backward
        let mut out: Vec<Point> = points.iter().step_by(2).copied().collect();
        let mut odd: Vec<Point> = points.iter().skip(1).step_by(2).copied().collect();
        odd.reverse();
        out.extend(odd);
        out
    }

    fn star(n: usize, outer: f64, inner: f64) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let a = 2.0 * PI * i as f64 / n as f64;
                let r = if i % 2 == 0 { outer } else { inner };
                Point::new(-111.7 + r * a.cos(), 41.74 + r * a.sin())
            })
            .collect()
    }

    #[test]
    fn fewer_than_three_points() {
        assert!(compute_ring(&[]).is_none());
        assert!(compute_ring(&[Point::new(0.0, 0.0)]).is_none());
        assert!(compute_ring(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).is_none());
    }

    #[test]
    fn ring_is_closed() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ];
        let ring = compute_ring(&pts).unwrap();
        assert_eq!(ring.len(), 4);
        assert!(ring.is_closed());
        assert_eq!(ring.vertex_count(), 3);
    }

    #[test]
    fn bowtie_clicks_become_square() {
        // clicking the corners diagonally would draw a bow tie in click order
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ];
        let ring = compute_ring(&pts).unwrap();
        assert!(ring.is_simple());
        assert!((ring.area() - 1.0).abs() < 1e-12);
        assert_eq!(
            ring.vertices(),
            &[
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ]
        );
    }

    #[test]
    fn star_shaped_input_is_simple() {
        for n in [6, 10, 16] {
            let pts = scrambled(star(n, 0.01, 0.004));
            let ring = compute_ring(&pts).unwrap();
            assert!(ring.is_closed());
            assert!(ring.is_simple(), "star with {n} points self-intersects");
        }
    }

    #[test]
    fn convex_input_is_simple() {
        let pts: Vec<Point> = (0..12)
            .map(|i| {
                let a = 2.0 * PI * i as f64 / 12.0 + 0.1;
                Point::new(3.0 * a.cos(), a.sin())
            })
            .collect();
        let ring = compute_ring(&scrambled(pts)).unwrap();
        assert!(ring.is_simple());
    }

    #[test]
    fn idempotent() {
        let pts = scrambled(star(8, 2.0, 1.0));
        assert_eq!(compute_ring(&pts), compute_ring(&pts));
    }

    #[test]
    fn identical_points_keep_input_order() {
        let p = Point::new(5.0, 5.0);
        let ring = compute_ring(&[p, p, p]).unwrap();
        assert_eq!(ring.points(), &[p, p, p, p]);
    }

    #[test]
    fn point_on_centroid_does_not_panic() {
        let pts = vec![
            Point::new(-1.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
        ];
        let ring = compute_ring(&pts).unwrap();
        assert_eq!(ring.vertex_count(), 3);
        assert!(ring.is_closed());
    }

    #[test]
    fn geometry_is_polygon() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ];
        let ring = compute_ring(&pts).unwrap();
        match ring.to_geometry().value {
            geojson::Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0][0], rings[0][3]);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }
}
