//! REST Client
//!
//! `RemoteService` over a PostgREST style table API plus an object storage
//! endpoint. Every request carries the project key both as `apikey` and as a
//! bearer token.

use super::{PhotoUpload, RemoteService};
use crate::shared::error::RemoteError;
use crate::shared::Job;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;
use std::time::Duration;

/// Default bucket for photo uploads
pub const DEFAULT_PHOTO_BUCKET: &str = "job-photos";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP implementation of [`RemoteService`]
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    endpoint: Url,
    api_key: String,
    photo_bucket: String,
}

impl RestClient {
    /// Create a client for the backend at `base_url`
    ///
    /// Fails with [`RemoteError::InvalidUrl`] unless `base_url` is an absolute
    /// URL that can carry a path.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, RemoteError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let endpoint =
            Url::parse(&base_url).map_err(|e| RemoteError::invalid_url(&base_url, e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(RemoteError::invalid_url(base_url, "URL cannot carry a path"));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            endpoint,
            api_key: api_key.into(),
            photo_bucket: DEFAULT_PHOTO_BUCKET.to_string(),
        })
    }

    /// Use a different default bucket for uploads
    pub fn with_photo_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.photo_bucket = bucket.into();
        self
    }

    /// Base URL requests are made against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Storage URL for an object; every path part is percent-encoded
    fn object_url(&self, bucket: &str, path: &str) -> Result<Url, RemoteError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::invalid_url(&self.base_url, "URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", bucket])
            .extend(path.split('/').filter(|part| !part.is_empty()));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(RemoteError::status(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn json_rows(response: Response) -> Result<Vec<Value>, RemoteError> {
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteService for RestClient {
    async fn fetch_job(&self, job_id: &str) -> Result<Job, RemoteError> {
        let request = self
            .client
            .get(self.url("/rest/v1/jobs"))
            .query(&[("id", format!("eq.{}", job_id)), ("select", "*".to_string())]);

        let rows = Self::json_rows(self.send(request).await?).await?;
        rows.into_iter()
            .next()
            .and_then(Job::from_value)
            .ok_or_else(|| RemoteError::not_found("job", job_id))
    }

    async fn update_job(&self, job_id: &str, patch: Value) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.url("/rest/v1/jobs"))
            .query(&[("id", format!("eq.{}", job_id))])
            .header("Prefer", "return=minimal")
            .json(&patch);

        self.send(request).await?;
        tracing::debug!("[Remote] Updated job {}", job_id);
        Ok(())
    }

    async fn create_work_report(&self, report: Value) -> Result<(), RemoteError> {
        let request = self
            .client
            .post(self.url("/rest/v1/work_reports"))
            .header("Prefer", "return=minimal")
            .json(&report);

        self.send(request).await?;
        tracing::debug!("[Remote] Created work report");
        Ok(())
    }

    async fn update_work_report(&self, report_id: &str, report: Value) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.url("/rest/v1/work_reports"))
            .query(&[("id", format!("eq.{}", report_id))])
            .header("Prefer", "return=minimal")
            .json(&report);

        self.send(request).await?;
        tracing::debug!("[Remote] Updated work report {}", report_id);
        Ok(())
    }

    async fn upload_photo(&self, upload: PhotoUpload) -> Result<String, RemoteError> {
        let bucket = upload.bucket.as_deref().unwrap_or(&self.photo_bucket);
        let request = self
            .client
            .post(self.object_url(bucket, &upload.path)?)
            .header("Content-Type", upload.content_type.as_str())
            .body(upload.bytes);

        self.send(request).await?;
        tracing::debug!("[Remote] Uploaded {}/{}", bucket, upload.path);
        Ok(upload.path)
    }

    async fn list_jobs(&self, technician_id: &str, statuses: &[String]) -> Result<Vec<Job>, RemoteError> {
        let mut query = vec![
            ("technician_id", format!("eq.{}", technician_id)),
            ("select", "*".to_string()),
        ];
        if !statuses.is_empty() {
            query.push(("status", format!("in.({})", statuses.join(","))));
        }

        let request = self.client.get(self.url("/rest/v1/jobs")).query(&query);
        let rows = Self::json_rows(self.send(request).await?).await?;

        rows.into_iter()
            .map(|row| Job::from_value(row).ok_or_else(|| RemoteError::decode("job row without id")))
            .collect()
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.send(self.client.get(self.url("/rest/v1/"))).await?;
        Ok(())
    }
}
