//! Server configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crew_script::SandboxConfig;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Configuration for a crew server.
///
/// Usually loaded from an optional TOML file and then overridden by CLI
/// flags.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ServerConfig {
    /// Content root directory.
    pub root: PathBuf,

    /// Address to listen on.
    #[builder(default = "default_addr()")]
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Key-value database path.
    #[builder(default = "default_storage()")]
    #[serde(default = "default_storage")]
    pub storage: PathBuf,

    /// Headline on every page.
    #[builder(default = "default_site_name()")]
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Sub-headline on every page.
    #[builder(default)]
    #[serde(default)]
    pub site_subtitle: String,

    /// Custom page template (None = built-in).
    #[builder(default)]
    #[serde(default)]
    pub page_template: Option<PathBuf>,

    /// Shared secret for the admin console (None = console disabled).
    #[builder(default)]
    #[serde(default)]
    pub admin_secret: Option<String>,

    /// Wall-clock budget per script run.
    #[builder(default = "5000")]
    #[serde(default = "default_script_timeout_ms")]
    pub script_timeout_ms: u64,

    /// Memory ceiling per script run, in MiB.
    #[builder(default = "64")]
    #[serde(default = "default_script_memory_mb")]
    pub script_memory_mb: usize,
}

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_storage() -> PathBuf {
    PathBuf::from("crew.db")
}

fn default_site_name() -> String {
    "crew".to_string()
}

fn default_script_timeout_ms() -> u64 {
    5000
}

fn default_script_memory_mb() -> usize {
    64
}

impl ServerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match &self.root {
            Some(root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            Some(_) => {}
        }
        if let Some(addr) = &self.addr {
            addr.parse::<SocketAddr>()
                .map_err(|e| format!("Invalid listen address '{addr}': {e}"))?;
        }
        if let Some(Some(secret)) = &self.admin_secret {
            if secret.split_whitespace().count() != 1 {
                return Err("Admin secret must be a single non-empty word".to_string());
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Create a new server config builder.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Defaults for serving `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            addr: default_addr(),
            storage: default_storage(),
            site_name: default_site_name(),
            site_subtitle: String::new(),
            page_template: None,
            admin_secret: None,
            script_timeout_ms: default_script_timeout_ms(),
            script_memory_mb: default_script_memory_mb(),
        }
    }

    /// Parse a TOML config file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ServerError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ServerError::config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Run the builder's validation on an already constructed config.
    pub fn check(&self) -> Result<(), ServerError> {
        ServerConfigBuilder::from(self.clone())
            .validate()
            .map_err(ServerError::config)
    }

    /// Parsed listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.addr
            .parse()
            .map_err(|e| ServerError::config(format!("Invalid listen address '{}': {e}", self.addr)))
    }

    /// Script sandbox rooted at `content_root`.
    pub fn sandbox(&self, content_root: &Path) -> SandboxConfig {
        SandboxConfig::new(content_root)
            .with_timeout(self.script_timeout_ms)
            .with_memory_limit(self.script_memory_mb * 1024 * 1024)
    }
}

impl From<ServerConfig> for ServerConfigBuilder {
    fn from(config: ServerConfig) -> Self {
        Self {
            root: Some(config.root),
            addr: Some(config.addr),
            storage: Some(config.storage),
            site_name: Some(config.site_name),
            site_subtitle: Some(config.site_subtitle),
            page_template: Some(config.page_template),
            admin_secret: Some(config.admin_secret),
            script_timeout_ms: Some(config.script_timeout_ms),
            script_memory_mb: Some(config.script_memory_mb),
        }
    }
}
