//! Shared runtime state for glr-daemon.
//!
//! Handlers receive `State<Arc<AppState>>`. Config and secrets are resolved
//! once at startup; the directory client is built per run because the base
//! URL may come from the request.

use std::sync::Arc;

use anyhow::Result;
use glr_config::{DirectoryCredentials, ReadinessConfig, ResolvedSecrets};
use glr_db::SnapshotStore;
use glr_odata::{ClientSettings, Directory, ODataClient};

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "glr-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Builds the [`Directory`] a run reads from.
pub trait DirectoryConnector: Send + Sync {
    fn connect(
        &self,
        api_base_url: &str,
        credentials: &DirectoryCredentials,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn Directory>>;
}

/// Production connector: the paging OData v2 client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ODataConnector;

impl DirectoryConnector for ODataConnector {
    fn connect(
        &self,
        api_base_url: &str,
        credentials: &DirectoryCredentials,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn Directory>> {
        let client = ODataClient::new(
            api_base_url,
            credentials.username.clone(),
            credentials.password.clone(),
            settings.clone(),
        )?;
        let dir: Arc<dyn Directory> = Arc::new(client);
        Ok(dir)
    }
}

/// Handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub config: ReadinessConfig,
    /// Hash of the effective layered config; stored with every snapshot.
    pub config_hash: String,
    pub secrets: ResolvedSecrets,
    pub store: Arc<dyn SnapshotStore>,
    pub connector: Arc<dyn DirectoryConnector>,
}

impl AppState {
    pub fn new(
        config: ReadinessConfig,
        config_hash: impl Into<String>,
        secrets: ResolvedSecrets,
        store: Arc<dyn SnapshotStore>,
        connector: Arc<dyn DirectoryConnector>,
    ) -> Self {
        Self {
            build: BuildInfo::default(),
            config,
            config_hash: config_hash.into(),
            secrets,
            store,
            connector,
        }
    }
}
