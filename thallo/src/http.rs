//! HTTP implementation of [`Backend`] on top of `reqwest`.
//!
//! `reqwest` expects a tokio reactor, so every request future is wrapped in
//! [`async_compat::Compat`] to run on the smol executor used by the session.

use async_compat::Compat;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::model::{
    JobStatusResponse, LeverSet, Project, ProjectCreate, ProjectId, RecommendationSet,
    SimulationResult, Validate,
};
use crate::transport::Backend;
use crate::{Error, Result};

/// Backend reached over the REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for an API path such as `/projects/1`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = Compat::new(request.send())
            .await
            .map_err(|e| Error::Unreachable(e.to_string()))?;
        let status = response.status();
        let body = Compat::new(response.text())
            .await
            .map_err(|e| Error::Unreachable(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(body)
    }

    async fn fetch<T: DeserializeOwned + Validate>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        decode(&body)
    }
}

/// Parses and validates a response body.
pub fn decode<T: DeserializeOwned + Validate>(body: &str) -> Result<T> {
    let value: T = serde_json::from_str(body)?;
    value.validate()?;
    Ok(value)
}

/// Extracts the `detail` message of an API error body.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.chars().take(200).collect(),
    }
}

impl Backend for HttpBackend {
    async fn create_project(&self, body: &ProjectCreate) -> Result<Project> {
        body.validate()?;
        log::info!("creating project {:?}", body.name);
        self.fetch(self.client.post(self.url("/projects")).json(body))
            .await
    }

    async fn start_simulation(&self, id: ProjectId) -> Result<()> {
        log::info!("starting simulation for project {id}");
        self.send(self.client.post(self.url(&format!("/projects/{id}/simulate"))))
            .await
            .map(|_| ())
    }

    async fn job_status(&self, id: ProjectId) -> Result<JobStatusResponse> {
        self.fetch(self.client.get(self.url(&format!("/projects/{id}/results"))))
            .await
    }

    async fn recompute(&self, id: ProjectId, levers: &LeverSet) -> Result<SimulationResult> {
        levers.validate()?;
        self.fetch(
            self.client
                .patch(self.url(&format!("/projects/{id}/whatif")))
                .json(levers),
        )
        .await
    }

    async fn recommendations(&self, id: ProjectId) -> Result<RecommendationSet> {
        self.fetch(self.client.post(self.url(&format!("/projects/{id}/recommend"))))
            .await
    }

    async fn project(&self, id: ProjectId) -> Result<Project> {
        self.fetch(self.client.get(self.url(&format!("/projects/{id}"))))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_join() {
        let config = ClientConfig {
            base_url: "http://localhost:8000/".into(),
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.url("/projects/3"), "http://localhost:8000/projects/3");
    }

    #[test]
    fn fastapi_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "Project 9 not found"}"#),
            "Project 9 not found"
        );
        assert_eq!(error_detail("Internal Server Error"), "Internal Server Error");
    }

    #[test]
    fn decode_validates() {
        let err = decode::<JobStatusResponse>(r#"{"status": "complete"}"#).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
        let err = decode::<JobStatusResponse>("<html>").unwrap_err();
        assert!(err.is_transport());
        let ok = decode::<JobStatusResponse>(r#"{"status": "pending", "results": null}"#).unwrap();
        assert_eq!(ok.status, crate::model::JobStatus::Pending);
    }

    #[test]
    fn invalid_levers_never_sent() {
        let backend = HttpBackend::new(&ClientConfig::default()).unwrap();
        let levers = LeverSet {
            unit_reduction_pct: 2.0,
            ..Default::default()
        };
        let err = smol::block_on(backend.recompute(1, &levers)).unwrap_err();
        assert!(err.is_validation());
    }
}
