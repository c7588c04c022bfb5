//! Live capture of a parcel boundary from map clicks and drags.

use crate::geometry::{compute_ring, Point, Ring};
use crate::{Error, Result};

/// Receives the ring every time the captured boundary changes.
///
/// `None` means the parcel dropped below three points and there is nothing to
/// draw or submit.
pub trait RingSink {
    fn ring_changed(&mut self, ring: Option<&Ring>);
}

impl<F> RingSink for F
where
    F: FnMut(Option<&Ring>),
{
    fn ring_changed(&mut self, ring: Option<&Ring>) {
        self(ring)
    }
}

/// Sink that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSink;

impl RingSink for NoSink {
    fn ring_changed(&mut self, _ring: Option<&Ring>) {}
}

/// Points entered by the user, in click order, plus the derived ring.
///
/// Each point is addressed by its index, so a drag can move it in place.
/// The ring is recomputed from scratch after every mutation and pushed to the
/// sink before the mutating call returns.
#[derive(Debug)]
pub struct GeometryCapture<S = NoSink> {
    points: Vec<Point>,
    ring: Option<Ring>,
    max_points: Option<usize>,
    sink: S,
}

impl GeometryCapture<NoSink> {
    /// Creates an empty capture without a sink.
    pub fn new() -> Self {
        Self::with_sink(NoSink)
    }
}

impl Default for GeometryCapture<NoSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RingSink> GeometryCapture<S> {
    /// Creates an empty capture that reports ring changes to `sink`.
    pub fn with_sink(sink: S) -> Self {
        Self {
            points: Vec::new(),
            ring: None,
            max_points: None,
            sink,
        }
    }

    /// Limits the number of points; further clicks are ignored.
    pub fn with_max_points(mut self, max: Option<usize>) -> Self {
        self.max_points = max;
        self
    }

    /// Points in click order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Current ring, absent while fewer than three points exist.
    pub fn ring(&self) -> Option<&Ring> {
        self.ring.as_ref()
    }

    /// Returns `true` once the parcel can be submitted.
    pub fn is_complete(&self) -> bool {
        self.ring.is_some()
    }

    /// Returns the ring or an incompleteness error.
    pub fn require_ring(&self) -> Result<&Ring> {
        self.ring
            .as_ref()
            .ok_or(Error::IncompleteParcel(self.points.len()))
    }

    /// Appends a point and returns its index.
    ///
    /// Returns `None` only when a configured cap is already reached.
    pub fn add_point(&mut self, point: Point) -> Option<usize> {
        if let Some(max) = self.max_points {
            if self.points.len() >= max {
                log::debug!("ignoring point past cap of {max}");
                return None;
            }
        }
        self.points.push(point);
        self.refresh();
        Some(self.points.len() - 1)
    }

    /// Moves an existing point. Out-of-range indices are ignored.
    pub fn move_point(&mut self, index: usize, point: Point) -> bool {
        match self.points.get_mut(index) {
            Some(p) => {
                *p = point;
                self.refresh();
                true
            }
            None => {
                log::debug!("dropping drag for missing point {index}");
                false
            }
        }
    }

    /// Removes every point.
    pub fn clear(&mut self) {
        self.points.clear();
        self.refresh();
    }

    /// Consumes the capture and returns the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn refresh(&mut self) {
        let had_ring = self.ring.is_some();
        self.ring = compute_ring(&self.points);
        if had_ring || self.ring.is_some() {
            self.sink.ring_changed(self.ring.as_ref());
        }
    }
}

/// Representation of a land parcel defined by a closed boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub boundary: Ring,
}

impl Parcel {
    /// Creates a new parcel from its boundary ring.
    pub fn new(boundary: Ring) -> Self {
        Self { boundary }
    }

    /// Builds a parcel from unordered points.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        compute_ring(points)
            .map(Self::new)
            .ok_or(Error::IncompleteParcel(points.len()))
    }

    /// Calculates the area enclosed by the parcel boundary.
    pub fn area(&self) -> f64 {
        self.boundary.area()
    }

    /// GeoJSON geometry submitted with the project.
    pub fn geometry(&self) -> geojson::Geometry {
        self.boundary.to_geometry()
    }
}
