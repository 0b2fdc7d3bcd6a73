//! Async HTTP client for one runner service endpoint set.

use std::time::Duration;

use anyhow::Context;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Target;
use crate::error::ApiError;

use super::response::{
    self, Cancelled, Deployed, JobList, ProjectList, Removed, Scheduled, SpiderList, VersionList,
};

/// Optional knobs for a schedule call.
#[derive(Debug, Clone, Default)]
pub struct ScheduleRequest {
    /// Deployed version to run instead of the latest.
    pub version: Option<String>,
    /// `KEY=VALUE` setting overrides, passed as repeated `setting` fields.
    pub settings: Vec<String>,
    /// Spider arguments, passed through as-is.
    pub args: Vec<(String, String)>,
}

/// Client shared by every call of one invocation. Cheap to clone; each
/// call borrows a [`Target`] so one client can talk to many services.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    /// Build a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gantry/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }

    /// Upload an archive as a new version of `project`.
    pub async fn add_version(
        &self,
        target: &Target,
        project: &str,
        version: &str,
        archive: Vec<u8>,
    ) -> Result<Deployed, ApiError> {
        let url = self.endpoint(target, "addversion.json")?;
        let size = archive.len();
        let file = multipart::Part::bytes(archive)
            .file_name(format!("{project}-{version}.zip"))
            .mime_str("application/octet-stream")
            .map_err(|err| ApiError::Protocol {
                url: url.to_string(),
                detail: format!("cannot encode archive part: {err}"),
            })?;
        // The wire protocol names the upload field "egg" regardless of the
        // archive format.
        let form = multipart::Form::new()
            .text("project", project.to_string())
            .text("version", version.to_string())
            .part("egg", file);
        tracing::debug!(%url, project, version, size, "uploading archive");
        let request = self
            .authorized(self.http.post(url.clone()), target)
            .multipart(form);
        self.dispatch(request, &url).await
    }

    /// Schedule one spider run; the service answers with the job id.
    pub async fn schedule(
        &self,
        target: &Target,
        project: &str,
        spider: &str,
        request: &ScheduleRequest,
    ) -> Result<Scheduled, ApiError> {
        let mut params: Vec<(String, String)> = vec![
            ("project".to_string(), project.to_string()),
            ("spider".to_string(), spider.to_string()),
        ];
        if let Some(version) = &request.version {
            params.push(("_version".to_string(), version.clone()));
        }
        for setting in &request.settings {
            params.push(("setting".to_string(), setting.clone()));
        }
        for (key, value) in &request.args {
            params.push((key.clone(), value.clone()));
        }
        self.post_form(target, "schedule.json", &params).await
    }

    pub async fn cancel(
        &self,
        target: &Target,
        project: &str,
        job: &str,
    ) -> Result<Cancelled, ApiError> {
        let params = [
            ("project".to_string(), project.to_string()),
            ("job".to_string(), job.to_string()),
        ];
        self.post_form(target, "cancel.json", &params).await
    }

    pub async fn list_projects(&self, target: &Target) -> Result<ProjectList, ApiError> {
        self.get(target, "listprojects.json", &[]).await
    }

    pub async fn list_versions(
        &self,
        target: &Target,
        project: &str,
    ) -> Result<VersionList, ApiError> {
        self.get(target, "listversions.json", &[("project", project)])
            .await
    }

    /// Spiders of `project`, optionally pinned to a deployed version.
    pub async fn list_spiders(
        &self,
        target: &Target,
        project: &str,
        version: Option<&str>,
    ) -> Result<SpiderList, ApiError> {
        let mut params = vec![("project", project)];
        if let Some(version) = version {
            params.push(("_version", version));
        }
        self.get(target, "listspiders.json", &params).await
    }

    pub async fn list_jobs(&self, target: &Target, project: &str) -> Result<JobList, ApiError> {
        self.get(target, "listjobs.json", &[("project", project)])
            .await
    }

    pub async fn delete_version(
        &self,
        target: &Target,
        project: &str,
        version: &str,
    ) -> Result<Removed, ApiError> {
        let params = [
            ("project".to_string(), project.to_string()),
            ("version".to_string(), version.to_string()),
        ];
        self.post_form(target, "delversion.json", &params).await
    }

    pub async fn delete_project(&self, target: &Target, project: &str) -> Result<Removed, ApiError> {
        let params = [("project".to_string(), project.to_string())];
        self.post_form(target, "delproject.json", &params).await
    }

    fn endpoint(&self, target: &Target, action: &str) -> Result<Url, ApiError> {
        target.url.join(action).map_err(|err| ApiError::Protocol {
            url: target.url.to_string(),
            detail: format!("cannot build endpoint '{action}': {err}"),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        target: &Target,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(target, action)?;
        tracing::debug!(%url, "GET");
        let mut request = self.http.get(url.clone());
        if !params.is_empty() {
            request = request.query(params);
        }
        let request = self.authorized(request, target);
        self.dispatch(request, &url).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        target: &Target,
        action: &str,
        params: &[(String, String)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(target, action)?;
        tracing::debug!(%url, "POST");
        let request = self
            .authorized(self.http.post(url.clone()), target)
            .form(&params);
        self.dispatch(request, &url).await
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        target: &Target,
    ) -> reqwest::RequestBuilder {
        match &target.username {
            Some(username) => request.basic_auth(username, target.password.as_deref()),
            None => request,
        }
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|err| classify(err, url))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|err| classify(err, url))?;
        response::decode_body(url, status, &body)
    }
}

/// Map a transport failure onto the taxonomy. Timeouts get their own
/// variant; everything else that died before a usable response counts as
/// a connection problem.
fn classify(err: reqwest::Error, url: &Url) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout {
            url: url.to_string(),
        }
    } else {
        ApiError::Connection {
            url: url.to_string(),
            detail: err.to_string(),
        }
    }
}
