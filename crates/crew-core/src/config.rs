//! Sidecar configuration files.
//!
//! Every node may carry an optional JSON sidecar next to it:
//! `_<file name>.conf.json` for a file, `_.conf.json` inside a directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::TreeError;
use crate::node::{BasicCredentials, ContentType, Node};

/// Sidecar file name used by directories.
const DIR_SIDECAR: &str = "_.conf.json";

/// Suffix shared by every sidecar file.
const SIDECAR_SUFFIX: &str = ".conf.json";

/// Basic auth section of a sidecar file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicAuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Parsed sidecar file. Absent or empty fields keep the node defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, rename = "desc")]
    pub description: Option<String>,

    #[serde(default)]
    pub hidden: bool,

    /// `file`, `kv`, `rpc` or `script`.
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,

    /// Key-value lookup key, used when `type` is `kv`.
    #[serde(default)]
    pub key: Option<String>,

    /// JSON-RPC endpoint, used when `type` is `rpc`.
    #[serde(default)]
    pub rpc_endpoint: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub basic_auth: Option<BasicAuthConfig>,
}

/// Location of the sidecar file for `path`.
pub fn sidecar_path(path: &Path, is_dir: bool) -> PathBuf {
    if is_dir {
        return path.join(DIR_SIDECAR);
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    path.with_file_name(format!("_{name}{SIDECAR_SUFFIX}"))
}

/// Whether a directory entry name is a sidecar file.
pub fn is_sidecar_name(name: &str) -> bool {
    name.starts_with('_') && name.ends_with(SIDECAR_SUFFIX)
}

impl NodeConfig {
    /// Load the sidecar for `path`, if one exists.
    pub fn load(path: &Path, is_dir: bool) -> Result<Option<Self>, TreeError> {
        let config_path = sidecar_path(path, is_dir);
        let data = match std::fs::read(&config_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TreeError::Io { path: config_path, source: e }),
        };
        Self::from_slice(&data)
            .map(Some)
            .map_err(|message| TreeError::config(&config_path, message))
    }

    /// Parse a sidecar document.
    pub fn from_slice(data: &[u8]) -> Result<Self, String> {
        let config: Self = serde_json::from_slice(data).map_err(|e| e.to_string())?;
        config.content_type()?;
        Ok(config)
    }

    /// The declared content type, if any. Unknown names are rejected.
    pub fn content_type(&self) -> Result<Option<ContentType>, String> {
        match non_empty(&self.content_type) {
            None => Ok(None),
            Some(name) => name
                .parse::<ContentType>()
                .map(Some)
                .map_err(|_| format!("unknown node type {name:?}")),
        }
    }

    /// Overlay this config onto a node built from filesystem metadata.
    pub fn apply(self, node: &mut Node, config_path: &Path) -> Result<(), TreeError> {
        let content_type = self
            .content_type()
            .map_err(|message| TreeError::config(config_path, message))?;

        if let Some(title) = non_empty(&self.title) {
            node.title = title.into();
        }
        if let Some(desc) = non_empty(&self.description) {
            node.description = desc.into();
        }
        node.hidden = self.hidden;

        match content_type {
            Some(tp) if node.is_dir && tp != ContentType::Static => {
                tracing::warn!(
                    path = %config_path.display(),
                    node_type = %tp,
                    "ignoring node type on a directory"
                );
            }
            Some(tp) => node.content_type = tp,
            None => {}
        }

        if node.content_type == ContentType::KeyValue {
            node.routing_key = non_empty(&self.key).map(str::to_string);
        }
        node.remote_endpoint = non_empty(&self.rpc_endpoint).map(str::to_string);
        node.bearer_token = non_empty(&self.auth_token).map(str::to_string);
        node.basic_credentials = self
            .basic_auth
            .map(|auth| BasicCredentials::new(auth.username, auth.password));

        Ok(())
    }

    /// Whether the sidecar sets an explicit content type.
    pub fn has_type(&self) -> bool {
        non_empty(&self.content_type).is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
