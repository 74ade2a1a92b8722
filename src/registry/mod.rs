//! Module registry client
//!
//! Talks to a module-proxy shaped registry. For a module path `m` and a base
//! URL `b`, the registry serves:
//!
//! - `b/<escaped m>/@v/list`: newline separated version strings
//! - `b/<escaped m>/@latest`: `{"Version": ..., "Time": ...}` for the newest version
//! - `b/<escaped m>/@v/<version>.info`: the same record for one version
//! - `b/<escaped m>/@v/<version>.zip`: the package archive
//!
//! Any non-success status is a failure. Nothing is retried.

mod path;

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PlugmanError, Result};

pub use path::{escape_module_path, is_valid_version, module_leaf, validate_module_path};

const REGISTRY_USER_AGENT: &str = concat!("plugman/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 15;

/// A published version and its commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersionInfo {
    #[serde(rename = "Version", alias = "version")]
    pub version: String,

    #[serde(rename = "Time", alias = "time")]
    pub time: DateTime<Utc>,
}

/// Build the archive URL for a module version. Pure; no I/O.
pub fn download_url(base_url: &str, module: &str, version: &str) -> String {
    format!(
        "{}/{}/@v/{}.zip",
        base_url.trim_end_matches('/'),
        escape_module_path(module),
        version
    )
}

/// Client for the registry version endpoints.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url`.
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .user_agent(REGISTRY_USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, base_url)
    }

    /// Create a client that reuses an existing HTTP client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Archive URL for `module` at `version` on this registry.
    pub fn download_url(&self, module: &str, version: &str) -> String {
        download_url(&self.base_url, module, version)
    }

    /// All published versions, in the order the registry lists them.
    ///
    /// Issues one list request and then one `.info` request per version. The
    /// first failing lookup aborts the whole listing.
    pub async fn list_versions(&self, module: &str) -> Result<Vec<ModuleVersionInfo>> {
        validate_module_path(module)?;
        let url = format!("{}/@v/list", self.module_url(module));
        let response = self.get(module, &url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| PlugmanError::RegistryUnavailable {
                module: module.to_string(),
                status: None,
                reason: format!("failed to read version list: {}", e),
            })?;

        let versions = parse_version_list(&body);
        debug!(module = %module, count = versions.len(), "Fetched version list");

        let mut infos = Vec::with_capacity(versions.len());
        for version in versions {
            let info = self.info(module, version).await.map_err(|e| {
                PlugmanError::VersionInfoUnavailable {
                    module: module.to_string(),
                    version: version.to_string(),
                    source: Box::new(e),
                }
            })?;
            infos.push(info);
        }

        info!(module = %module, versions = infos.len(), "Resolved remote versions");
        Ok(infos)
    }

    /// The newest version according to the registry.
    pub async fn latest(&self, module: &str) -> Result<ModuleVersionInfo> {
        validate_module_path(module)?;
        let url = format!("{}/@latest", self.module_url(module));
        self.get_record(module, &url).await
    }

    /// Metadata for one explicitly named version.
    pub async fn info(&self, module: &str, version: &str) -> Result<ModuleVersionInfo> {
        validate_module_path(module)?;
        let url = format!("{}/@v/{}.info", self.module_url(module), version);
        self.get_record(module, &url).await
    }

    fn module_url(&self, module: &str) -> String {
        format!("{}/{}", self.base_url, escape_module_path(module))
    }

    async fn get(&self, module: &str, url: &str) -> Result<Response> {
        debug!(url = %url, "Registry request");
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| PlugmanError::RegistryUnavailable {
                    module: module.to_string(),
                    status: None,
                    reason: e.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlugmanError::RegistryUnavailable {
                module: module.to_string(),
                status: Some(status.as_u16()),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }
        Ok(response)
    }

    async fn get_record(&self, module: &str, url: &str) -> Result<ModuleVersionInfo> {
        let response = self.get(module, url).await?;
        let record: ModuleVersionInfo = response.json().await.map_err(|e| {
            if e.is_decode() {
                PlugmanError::MalformedResponse {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                PlugmanError::RegistryUnavailable {
                    module: module.to_string(),
                    status: None,
                    reason: format!("failed to read response body: {}", e),
                }
            }
        })?;

        if !is_valid_version(&record.version) {
            return Err(PlugmanError::MalformedResponse {
                url: url.to_string(),
                reason: format!("unusable version {:?}", record.version),
            });
        }
        Ok(record)
    }
}

/// Split a `@v/list` body into version strings, dropping blank lines.
fn parse_version_list(body: &str) -> Vec<&str> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
