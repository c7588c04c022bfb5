//! Error type shared by the whole crate.

/// Everything that can go wrong between a click on the map and a verdict.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The parcel does not have enough points to form a polygon yet.
    #[error("parcel needs at least 3 points, got {0}")]
    IncompleteParcel(usize),
    /// A value was rejected locally and never sent to the backend.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The request never produced a response.
    #[error("could not reach the backend: {0}")]
    Unreachable(String),
    /// The backend answered with a non-success status code.
    #[error("backend returned HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    /// The backend answered with a payload that does not match its schema.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// The simulation job reported `failed`.
    #[error("the simulation encountered an error")]
    JobFailed,
    /// The session task is gone, usually after teardown.
    #[error("session is closed")]
    SessionClosed,
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` for failures of the transport itself or of its payloads.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Unreachable(_) | Error::Http { .. } | Error::Malformed(_)
        )
    }

    /// Returns `true` for errors raised before anything was sent.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::IncompleteParcel(_) | Error::InvalidInput(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
