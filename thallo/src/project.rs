//! Project submission: form fields plus the captured parcel.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Ring};
use crate::model::{Project, ProjectCreate, Validate};
use crate::parcel::{GeometryCapture, RingSink};
use crate::transport::Backend;
use crate::Result;

/// Everything the submission form holds before the project exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub unit_count: u32,
    pub build_year: i32,
    #[serde(default)]
    pub greywater_recycling: bool,
    #[serde(default)]
    pub pipeline_added: bool,
    /// Parcel points in click order.
    #[serde(default)]
    pub points: Vec<Point>,
}

impl ProjectDraft {
    pub fn new(name: impl Into<String>, unit_count: u32, build_year: i32) -> Self {
        Self {
            name: name.into(),
            unit_count,
            build_year,
            greywater_recycling: false,
            pipeline_added: false,
            points: Vec::new(),
        }
    }

    /// Builds the creation request for `ring`.
    pub fn to_request(&self, ring: &Ring) -> ProjectCreate {
        ProjectCreate {
            name: self.name.trim().to_string(),
            unit_count: self.unit_count,
            build_year: self.build_year,
            parcel_geojson: ring.to_geometry(),
            greywater_recycling: self.greywater_recycling,
            pipeline_added: self.pipeline_added,
        }
    }

    /// Replays the stored points into a fresh capture.
    pub fn capture(&self) -> GeometryCapture {
        let mut capture = GeometryCapture::new();
        for p in &self.points {
            capture.add_point(*p);
        }
        capture
    }
}

/// Creates the project from the captured ring and triggers its baseline run.
///
/// Nothing is sent unless the parcel is complete and the form is valid. The
/// returned project id is ready to be polled.
pub async fn submit_project<B, S>(
    backend: &B,
    draft: &ProjectDraft,
    capture: &GeometryCapture<S>,
) -> Result<Project>
where
    B: Backend,
    S: RingSink,
{
    let ring = capture.require_ring()?;
    let request = draft.to_request(ring);
    request.validate()?;
    let project = backend.create_project(&request).await?;
    log::info!("project {} created ({})", project.id, project.summary());
    backend.start_simulation(project.id).await?;
    Ok(project)
}
