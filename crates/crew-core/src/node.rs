//! Content node types.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use strum::{Display, EnumString};

/// Rendering strategy attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
pub enum ContentType {
    /// Markdown/HTML/raw file content, or a directory listing.
    #[default]
    #[strum(serialize = "file")]
    Static,
    /// Body looked up in the key-value store.
    #[strum(serialize = "kv")]
    KeyValue,
    /// Body produced by a remote `Render` call.
    #[strum(serialize = "rpc")]
    RemoteProcedure,
    /// Body produced by an embedded Lua script.
    #[strum(to_string = "script", serialize = "lua")]
    Script,
}

/// Username/password pair for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A resolved file or directory under the content root.
///
/// A node's identity is its absolute path: equality and hashing only look at
/// `path`, so two resolutions of the same entry are interchangeable.
#[derive(Debug, Clone)]
pub struct Node {
    /// Absolute filesystem path.
    pub path: PathBuf,

    /// Display title.
    pub title: CompactString,

    /// Short description shown next to the title in listings.
    pub description: CompactString,

    /// Whether this is a directory.
    pub is_dir: bool,

    /// Hidden nodes stay addressable but are left out of navigation.
    pub hidden: bool,

    /// Rendering strategy. Always `Static` for directories.
    pub content_type: ContentType,

    /// Lookup key override for `KeyValue` nodes.
    pub routing_key: Option<String>,

    /// Endpoint for `RemoteProcedure` nodes.
    pub remote_endpoint: Option<String>,

    /// Bearer token required to access this node.
    pub bearer_token: Option<String>,

    /// Basic credentials required for this node and its descendants.
    pub basic_credentials: Option<BasicCredentials>,
}

impl Node {
    /// Create a node with default metadata derived from its path.
    pub fn new(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        let path = path.into();
        let title = default_title(&path);
        Self {
            path,
            title,
            description: CompactString::default(),
            is_dir,
            hidden: false,
            content_type: ContentType::Static,
            routing_key: None,
            remote_endpoint: None,
            bearer_token: None,
            basic_credentials: None,
        }
    }

    /// File name of this node (empty for `/`).
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Lower-cased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Whether the file holds markdown.
    pub fn is_markdown(&self) -> bool {
        !self.is_dir && matches!(self.extension().as_deref(), Some("md" | "markdown"))
    }

    /// Whether the file holds HTML.
    pub fn is_html(&self) -> bool {
        !self.is_dir && matches!(self.extension().as_deref(), Some("html" | "htm"))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Title derived from a file name: extension stripped, underscores as spaces.
fn default_title(path: &Path) -> CompactString {
    let name = path
        .file_stem()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    CompactString::from(name.replace('_', " "))
}
