//! Client core for the Thallo parcel water-viability service.
//!
//! The crate captures a parcel boundary, submits it as a project, polls the
//! baseline simulation and then keeps a live what-if view in sync with the
//! backend. The state machines in [`polling`], [`whatif`] and [`recommend`]
//! are pure and clocked by the caller; [`session`] drives them on smol.

pub mod config;
pub mod error;
pub mod geometry;
pub mod http;
pub mod io;
pub mod model;
pub mod parcel;
pub mod polling;
pub mod project;
pub mod recommend;
pub mod session;
pub mod transport;
pub mod whatif;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use http::HttpBackend;
pub use parcel::GeometryCapture;
pub use project::{submit_project, ProjectDraft};
pub use session::{ResultsSession, ResultsView, SessionHandle, SessionPhase};
pub use transport::Backend;
