use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Credentials, HarborSettings};
use crate::errors::HarborError;
use crate::models::{ArtifactRecord, Finding, Project, Repository};
use super::provider::{GatewayConnector, RegistryGateway};
use super::types::CallDiagnostics;

const API_PREFIX: &str = "/api/v2.0";
const MAX_PAGES: u32 = 1_000;
const VULNERABILITY_FETCH_CONCURRENCY: usize = 4;

/// Harbor v2 REST client using HTTP basic auth.
pub struct HarborGateway {
    client: Client,
    base_url: String,
    username: String,
    secret: String,
    page_size: u32,
    last_call: Mutex<Option<CallDiagnostics>>,
}

impl HarborGateway {
    pub fn new(credentials: &Credentials, settings: &HarborSettings) -> Result<Self, HarborError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| HarborError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: api_base_url(&credentials.url),
            username: credentials.username.clone(),
            secret: credentials.secret.clone(),
            page_size: settings.page_size.max(1),
            last_call: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks the API is reachable within `timeout` and that the credentials
    /// are accepted.
    pub async fn verify(&self, timeout: Duration) -> Result<(), HarborError> {
        self.send(Method::GET, "/ping", &[], Some(timeout)).await?;
        self.send(Method::GET, "/users/current", &[], Some(timeout))
            .await
            .map(|_| ())
            .or_else(|e| match e {
                // Robot accounts have no user record but are still authenticated.
                HarborError::Api { status: 403, .. } | HarborError::Api { status: 404, .. } => Ok(()),
                other => Err(other),
            })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, HarborError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.username, Some(&self.secret))
            .header("accept", "application/json")
            .query(query);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let result = request.send().await;
        let status = result.as_ref().ok().map(|r| r.status().as_u16());
        self.record(CallDiagnostics {
            method: method.to_string(),
            url: url.clone(),
            status_code: status,
        });

        let resp = result.map_err(|e| {
            if e.is_timeout() {
                HarborError::Network(format!("Request to {} timed out", url))
            } else {
                HarborError::Network(format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = resp.status();
        debug!(method = %method, url = %url, status = status.as_u16(), "Harbor API call");
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("request failed").to_string()
        });
        match status {
            StatusCode::UNAUTHORIZED => Err(HarborError::Authentication(message)),
            _ => Err(HarborError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HarborError> {
        let resp = self.send(Method::GET, path, query, None).await?;
        resp.json::<T>()
            .await
            .map_err(|e| HarborError::Network(format!("Invalid response from {}: {}", path, e)))
    }

    /// Follows `page`/`page_size` until a short page comes back.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<T>, HarborError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut query = vec![("page", page.to_string()), ("page_size", self.page_size.to_string())];
            query.extend(extra.iter().cloned());
            let batch: Option<Vec<T>> = self.get_json(path, &query).await?;
            let batch = batch.unwrap_or_default();
            let len = batch.len();
            items.extend(batch);
            if len < self.page_size as usize {
                return Ok(items);
            }
        }
        warn!(
            path,
            pages = MAX_PAGES,
            items = items.len(),
            "Stopped paging at the page limit, results are truncated"
        );
        Ok(items)
    }

    async fn fetch_findings(&self, project: &str, repo: &str, digest: &str) -> Result<Vec<Finding>, HarborError> {
        let path = format!(
            "/projects/{}/repositories/{}/artifacts/{}/additions/vulnerabilities",
            project,
            encode_repository(repo),
            digest
        );
        match self.get_json::<Option<serde_json::Map<String, Value>>>(&path, &[]).await {
            Ok(reports) => Ok(findings_from_reports(reports.unwrap_or_default())),
            // Not scanned yet, or no scanner configured.
            Err(HarborError::Api { status: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn record(&self, diagnostics: CallDiagnostics) {
        diagnostics.note();
        if let Ok(mut last) = self.last_call.lock() {
            *last = Some(diagnostics);
        }
    }
}

#[async_trait]
impl RegistryGateway for HarborGateway {
    async fn list_projects(&self) -> Result<Vec<Project>, HarborError> {
        self.get_paginated("/projects", &[]).await
    }

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>, HarborError> {
        self.get_paginated(&format!("/projects/{}/repositories", project), &[]).await
    }

    async fn list_artifacts(&self, repository: &str) -> Result<Vec<ArtifactRecord>, HarborError> {
        let (project, repo) = Repository::split_name(repository).ok_or_else(|| {
            HarborError::Validation(format!("repository '{}' is not of the form project/name", repository))
        })?;

        let path = format!("/projects/{}/repositories/{}/artifacts", project, encode_repository(repo));
        let artifacts: Vec<HarborArtifact> = self
            .get_paginated(
                &path,
                &[("with_tag", "true".to_string()), ("with_scan_overview", "true".to_string())],
            )
            .await?;

        let records = stream::iter(artifacts)
            .map(|artifact| async move {
                let findings = if artifact.has_scan_overview() {
                    self.fetch_findings(project, repo, &artifact.digest).await?
                } else {
                    Vec::new()
                };
                Ok::<_, HarborError>(artifact.into_record(repository, findings))
            })
            .buffered(VULNERABILITY_FETCH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        records.into_iter().collect()
    }

    fn last_call_diagnostics(&self) -> Option<CallDiagnostics> {
        self.last_call.lock().ok().and_then(|last| last.clone())
    }

    fn gateway_name(&self) -> &str {
        "harbor"
    }
}

/// Connects to Harbor over HTTP with the configured timeouts.
pub struct HarborConnector {
    settings: HarborSettings,
}

impl HarborConnector {
    pub fn new(settings: HarborSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl GatewayConnector for HarborConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn RegistryGateway>, HarborError> {
        let gateway = HarborGateway::new(credentials, &self.settings)?;
        info!(url = %gateway.base_url(), user = %credentials.username, "Authenticating with Harbor");
        gateway
            .verify(Duration::from_secs(self.settings.auth_timeout_secs.max(1)))
            .await
            .map_err(|e| match e {
                HarborError::Authentication(msg) => HarborError::Authentication(msg),
                other => HarborError::Authentication(format!("Login failed: {}", other)),
            })?;
        Ok(Arc::new(gateway))
    }
}

#[derive(Debug, Deserialize)]
struct HarborArtifact {
    digest: String,
    #[serde(default)]
    push_time: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Option<Vec<HarborTag>>,
    #[serde(default)]
    scan_overview: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct HarborTag {
    name: String,
}

impl HarborArtifact {
    fn has_scan_overview(&self) -> bool {
        self.scan_overview.as_ref().is_some_and(|o| !o.is_empty())
    }

    fn into_record(self, repository: &str, findings: Vec<Finding>) -> ArtifactRecord {
        ArtifactRecord {
            digest: self.digest,
            repository: repository.to_string(),
            tags: self.tags.unwrap_or_default().into_iter().map(|t| t.name).collect(),
            push_time: self.push_time,
            findings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VulnerabilityReport {
    #[serde(default)]
    vulnerabilities: Option<Vec<Finding>>,
}

/// The additions endpoint keys reports by MIME type; merge all of them.
fn findings_from_reports(reports: serde_json::Map<String, Value>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (mime, report) in reports {
        match serde_json::from_value::<VulnerabilityReport>(report) {
            Ok(report) => findings.extend(report.vulnerabilities.unwrap_or_default()),
            Err(e) => debug!(mime = %mime, error = %e, "Skipping unreadable vulnerability report"),
        }
    }
    findings
}

/// Harbor wants '/' inside repository names double-encoded.
fn encode_repository(repo: &str) -> String {
    repo.replace('/', "%252F")
}

fn api_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, API_PREFIX)
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value["errors"][0]["message"].as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_base_url_appends_prefix() {
        assert_eq!(api_base_url("https://harbor.local"), "https://harbor.local/api/v2.0");
        assert_eq!(api_base_url("https://harbor.local/"), "https://harbor.local/api/v2.0");
        assert_eq!(api_base_url("https://harbor.local/api/v2.0/"), "https://harbor.local/api/v2.0");
    }

    #[test]
    fn test_encode_nested_repository() {
        assert_eq!(encode_repository("nginx"), "nginx");
        assert_eq!(encode_repository("base/alpine"), "base%252Falpine");
    }

    #[test]
    fn test_error_message_from_harbor_body() {
        let body = r#"{"errors":[{"code":"NOT_FOUND","message":"project p9 not found"}]}"#;
        assert_eq!(error_message(body).as_deref(), Some("project p9 not found"));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_findings_from_reports_merges_mime_types() {
        let reports = json!({
            "application/vnd.security.vulnerability.report; version=1.1": {
                "severity": "High",
                "vulnerabilities": [
                    {"id": "CVE-2023-1111", "package": "openssl", "version": "1.1.1", "severity": "High"}
                ]
            },
            "application/vnd.scanner.adapter.vuln.report.harbor+json; version=1.0": {
                "vulnerabilities": null
            }
        });
        let findings = findings_from_reports(reports.as_object().unwrap().clone());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].cve_id, "CVE-2023-1111");
    }

    #[test]
    fn test_artifact_into_record() {
        let artifact: HarborArtifact = serde_json::from_value(json!({
            "digest": "sha256:abc",
            "push_time": "2023-05-01T10:00:00Z",
            "tags": [{"name": "latest"}, {"name": "1.25"}],
            "scan_overview": null
        }))
        .unwrap();
        assert!(!artifact.has_scan_overview());
        let record = artifact.into_record("library/nginx", vec![]);
        assert_eq!(record.tags, vec!["latest", "1.25"]);
        assert_eq!(record.repository, "library/nginx");
        assert!(record.push_time.is_some());
    }
}
