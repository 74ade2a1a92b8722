//! Command orchestration over an install root.
//!
//! `PluginManager` wires the pieces together: registry lookups feed the
//! downloader, downloads feed the archive installer, and the indexer feeds
//! removal. It owns no global state; everything comes in through `new`.

use std::path::PathBuf;

use tracing::info;

use crate::archive::{install_archive, InstallReport};
use crate::config::{Config, InstallLayout};
use crate::error::Result;
use crate::fetch::{DownloadProgress, FetchWriter};
use crate::plugins::{
    DetectionPolicy, PackageIndexer, PluginInfo, Pruner, RemovalReport, VersionRequest,
    VersionSelector,
};
use crate::registry::{module_leaf, validate_module_path, ModuleVersionInfo, RegistryClient};

/// Result of a successful `download`.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// The version that was resolved and installed.
    pub version: ModuleVersionInfo,
    /// Cached archive path.
    pub archive: PathBuf,
    pub install: InstallReport,
}

/// Runs plugin manager commands against one install root and registry.
#[derive(Debug, Clone)]
pub struct PluginManager {
    layout: InstallLayout,
    registry: RegistryClient,
    fetcher: FetchWriter,
    policy: DetectionPolicy,
}

impl PluginManager {
    pub fn new(config: &Config, layout: InstallLayout) -> Self {
        Self {
            registry: RegistryClient::new(config.registry_url()),
            fetcher: FetchWriter::new(),
            layout,
            policy: DetectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DetectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Every published version of `module`, in registry order.
    pub async fn list_remote(&self, module: &str) -> Result<Vec<ModuleVersionInfo>> {
        self.registry.list_versions(module).await
    }

    /// Resolve a version request to a concrete registry record.
    pub async fn resolve(&self, module: &str, request: &VersionRequest) -> Result<ModuleVersionInfo> {
        match request {
            VersionRequest::Latest => self.registry.latest(module).await,
            VersionRequest::Exact(version) => self.registry.info(module, version).await,
        }
    }

    /// Cache location for a module archive: `cache/<leaf>-<version>.zip`.
    pub fn archive_path(&self, module: &str, version: &str) -> PathBuf {
        self.layout
            .cache_dir()
            .join(format!("{}-{}.zip", module_leaf(module), version))
    }

    /// Resolve, download and install `module`.
    ///
    /// A failed extraction is not rolled back; files written before the
    /// failure stay under `pkg`.
    pub async fn download(
        &self,
        module: &str,
        request: &VersionRequest,
        progress: &mut (dyn DownloadProgress + Send),
    ) -> Result<DownloadOutcome> {
        validate_module_path(module)?;
        let version = self.resolve(module, request).await?;

        let url = self.registry.download_url(module, &version.version);
        let archive = self.archive_path(module, &version.version);
        info!(
            module = %module,
            version = %version.version,
            time = %version.time,
            "Downloading plugin"
        );

        self.fetcher.fetch(&url, &archive, progress).await?;
        let install = install_archive(&archive, &self.layout.pkg_dir())?;

        Ok(DownloadOutcome {
            version,
            archive,
            install,
        })
    }

    /// Installed plugins sorted by name, then version.
    pub fn list_local(&self) -> Result<Vec<PluginInfo>> {
        let mut plugins = self.indexer().scan()?;
        plugins.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
        Ok(plugins)
    }

    /// Remove installed versions of `name` and reclaim empty directories.
    pub fn remove(&self, name: &str, selector: &VersionSelector) -> Result<RemovalReport> {
        let installed = self.indexer().scan()?;
        Pruner::new(self.layout.pkg_dir()).remove(&installed, name, selector)
    }

    fn indexer(&self) -> PackageIndexer {
        PackageIndexer::new(self.layout.pkg_dir()).with_policy(self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::NoProgress;
    use crate::PlugmanError;
    use std::fs;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(base: &str, root: &std::path::Path) -> PluginManager {
        let config = Config {
            source: base.to_string(),
        };
        PluginManager::new(&config, InstallLayout::new(root))
    }

    #[test]
    fn test_archive_path_uses_leaf_and_version() {
        let m = manager("https://goproxy.io", std::path::Path::new("/pm"));
        assert_eq!(
            m.archive_path("github.com/acme/Tool", "v1.0.0"),
            PathBuf::from("/pm/cache/Tool-v1.0.0.zip")
        );
    }

    #[tokio::test]
    async fn test_resolve_latest_and_exact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/example.com/tool/@latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"Version": "v2.0.0", "Time": "2024-01-01T00:00:00Z"}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/example.com/tool/@v/v1.0.0.info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"Version": "v1.0.0", "Time": "2023-01-01T00:00:00Z"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let m = manager(&server.uri(), tmp.path());
        let latest = m
            .resolve("example.com/tool", &VersionRequest::Latest)
            .await
            .unwrap();
        assert_eq!(latest.version, "v2.0.0");
        let exact = m
            .resolve(
                "example.com/tool",
                &VersionRequest::Exact("v1.0.0".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(exact.version, "v1.0.0");
    }

    #[tokio::test]
    async fn test_download_registry_failure_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/example.com/tool/@latest"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let m = manager(&server.uri(), tmp.path());
        let err = m
            .download("example.com/tool", &VersionRequest::Latest, &mut NoProgress)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(!m.layout().cache_dir().exists());
        assert!(!m.layout().pkg_dir().exists());
    }

    #[tokio::test]
    async fn test_download_refuses_version_that_escapes_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/example.com/tool/@latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"Version": "../../../../escaped", "Time": "2024-01-01T00:00:00Z"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("pm");
        let m = manager(&server.uri(), &root);
        m.layout().ensure().unwrap();

        let err = m
            .download("example.com/tool", &VersionRequest::Latest, &mut NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PlugmanError::MalformedResponse { .. }));

        // Only the @latest lookup reached the registry; nothing was fetched.
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert!(!tmp.path().join("escaped.zip").exists());
        assert_eq!(fs::read_dir(m.layout().cache_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_rejects_non_plugin_archive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/example.com/tool/@v/v1.0.0.info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"Version": "v1.0.0", "Time": "2023-01-01T00:00:00Z"}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/example.com/tool/@v/v1.0.0.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(empty_zip()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let m = manager(&server.uri(), tmp.path());
        m.layout().ensure().unwrap();

        let err = m
            .download(
                "example.com/tool",
                &VersionRequest::Exact("v1.0.0".to_string()),
                &mut NoProgress,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlugmanError::NotAPluginArchive { .. }));
        // The archive stays cached; nothing lands in pkg.
        assert!(m.archive_path("example.com/tool", "v1.0.0").exists());
        assert_eq!(fs::read_dir(m.layout().pkg_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_list_local_is_sorted() {
        let tmp = TempDir::new().unwrap();
        let m = manager("https://goproxy.io", tmp.path());
        for rel in ["z/last@1.0.0", "a/first@2.0.0", "a/first@1.0.0"] {
            let dir = m.layout().pkg_dir().join(rel);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("manifest.json"), "{}").unwrap();
        }

        let ids: Vec<String> = m.list_local().unwrap().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["a/first@1.0.0", "a/first@2.0.0", "z/last@1.0.0"]);
    }

    fn empty_zip() -> Vec<u8> {
        use std::io::{Cursor, Write};
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("tool@v1.0.0/README.md", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"no manifest here").unwrap();
        zip.finish().unwrap().into_inner()
    }
}
