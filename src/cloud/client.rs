// Containership Firewall - Cloud Client
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! HTTP client for the cloud firewall policy endpoint.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{API_KEY_HEADER, ORGANIZATION_HEADER};
use crate::config::CloudSettings;
use crate::models::CloudPolicyRecord;

/// Contents of the local credential file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloudCredentials {
    pub organization: String,
    pub api_key: String,
}

impl CloudCredentials {
    /// Load credentials. A missing file is `Ok(None)`, not an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read credentials {}", path.display()))
            }
        };
        let credentials = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials {}", path.display()))?;
        Ok(Some(credentials))
    }
}

/// Fetches policy records for one cluster.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    cluster_id: String,
    credentials_path: PathBuf,
}

impl CloudClient {
    /// Build a client with the configured request timeout.
    pub fn new(settings: &CloudSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(concat!("containership-firewall/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_client(http, settings))
    }

    pub fn with_client(http: reqwest::Client, settings: &CloudSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            cluster_id: settings.cluster_id.clone(),
            credentials_path: settings.credentials_path.clone(),
        }
    }

    fn policy_url(&self, organization: &str) -> String {
        format!(
            "{}/v2/organizations/{}/clusters/{}/firewalls",
            self.base_url, organization, self.cluster_id
        )
    }

    /// Fetch the current policy records.
    ///
    /// Returns an empty list when no credential file is present. Transport
    /// errors, non-200 responses and bodies that are not a JSON array are
    /// errors; an individual record that does not decode is skipped.
    pub async fn fetch_policies(&self) -> Result<Vec<CloudPolicyRecord>> {
        let Some(credentials) = CloudCredentials::load(&self.credentials_path)? else {
            debug!(
                "No cloud credentials at {}, skipping cloud policy",
                self.credentials_path.display()
            );
            return Ok(Vec::new());
        };

        let url = self.policy_url(&credentials.organization);
        debug!("Fetching cloud firewall policy from {}", url);

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &credentials.api_key)
            .header(ORGANIZATION_HEADER, &credentials.organization)
            .send()
            .await
            .context("Cloud policy request failed")?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(anyhow!("Cloud policy request returned HTTP {}", status));
        }

        let items: Vec<Value> = response
            .json()
            .await
            .context("Failed to parse cloud policy response")?;

        let total = items.len();
        let records: Vec<CloudPolicyRecord> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping malformed cloud policy record: {}", e);
                    None
                }
            })
            .collect();

        debug!("Fetched {} of {} cloud policy records", records.len(), total);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortValue, SourceType};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POLICY_PATH: &str = "/v2/organizations/org-1/clusters/cluster-1/firewalls";

    fn write_credentials(dir: &Path) -> PathBuf {
        let path = dir.join("cloud.json");
        fs::write(&path, r#"{"organization": "org-1", "api_key": "secret"}"#).unwrap();
        path
    }

    fn client(server: &MockServer, credentials_path: PathBuf) -> CloudClient {
        let settings = CloudSettings {
            enabled: true,
            base_url: format!("{}/", server.uri()),
            cluster_id: "cluster-1".to_string(),
            credentials_path,
            ..Default::default()
        };
        CloudClient::new(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_headers_and_parses() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path(POLICY_PATH))
            .and(header("X-Api-Key", "secret"))
            .and(header("X-Organization", "org-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "protocol": "tcp", "port": 443, "type": "ip", "source": "*" },
                { "protocol": "tcp", "port": "8000", "type": "tag", "source": "role=web" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server, write_credentials(dir.path()))
            .fetch_policies()
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].port, PortValue::Number(443));
        assert_eq!(records[1].source_type, SourceType::Tag);
    }

    #[tokio::test]
    async fn test_malformed_record_skipped() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path(POLICY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "protocol": "tcp", "port": 443, "type": "ip", "source": "*" },
                { "protocol": "tcp", "port": null, "type": "ip", "source": "*" },
                { "protocol": "tcp", "port": -1, "type": "ip", "source": "*" },
                { "protocol": "udp", "port": 53, "type": "ip" }
            ])))
            .mount(&server)
            .await;

        let records = client(&server, write_credentials(dir.path()))
            .fetch_policies()
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].port, PortValue::Number(443));

        let rules = crate::rules::extend_with_cloud(Vec::new(), &records, &[]);
        assert_eq!(rules.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_skips_request() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let records = client(&server, dir.path().join("missing.json"))
            .fetch_policies()
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_non_200_is_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path(POLICY_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server, write_credentials(dir.path())).fetch_policies().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path(POLICY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client(&server, write_credentials(dir.path())).fetch_policies().await;
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_credentials_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.json");
        fs::write(&path, "{").unwrap();
        assert!(CloudCredentials::load(&path).is_err());
    }
}
