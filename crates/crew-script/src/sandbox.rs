//! Resource ceilings and filesystem scope for page scripts.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Capabilities a script may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read files under the content root.
    Read,

    /// Create and delete files under the content root.
    Write,
}

/// Limits applied to every script invocation.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Directory the `fs` helpers are confined to.
    pub root: PathBuf,

    /// Wall-clock budget per invocation in milliseconds (0 = unlimited).
    pub timeout_ms: u64,

    /// Maximum interpreter memory in bytes (0 = unlimited).
    pub max_memory: usize,

    /// Largest file `fs.read` will return.
    pub max_read_size: usize,

    /// Granted permissions.
    pub permissions: HashSet<Permission>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            timeout_ms: 5000,
            max_memory: 64 * 1024 * 1024,
            max_read_size: 10 * 1024 * 1024,
            permissions: HashSet::from([Permission::Read, Permission::Write]),
        }
    }
}

impl SandboxConfig {
    /// Default limits with `fs` scoped to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set memory limit.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Drop write access, leaving `fs` read-only.
    pub fn read_only(mut self) -> Self {
        self.permissions.remove(&Permission::Write);
        self
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Map a script-supplied path onto the root.
    ///
    /// A leading `/` means the root. Parent references and empty paths are
    /// rejected.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxViolation> {
        let trimmed = relative.trim_start_matches('/');
        let escape = || SandboxViolation {
            kind: ViolationKind::PathEscape,
            description: relative.to_string(),
            path: None,
        };
        if trimmed.is_empty() {
            return Err(escape());
        }
        let confined = Path::new(trimmed)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(escape());
        }
        Ok(self.root.join(trimmed))
    }

    /// Check a permission, producing the matching violation when absent.
    pub fn require(&self, permission: Permission, path: &Path) -> Result<(), SandboxViolation> {
        if self.has_permission(permission) {
            return Ok(());
        }
        let kind = match permission {
            Permission::Read => ViolationKind::ReadDenied,
            Permission::Write => ViolationKind::WriteDenied,
        };
        Err(SandboxViolation {
            kind,
            description: path.display().to_string(),
            path: Some(path.to_path_buf()),
        })
    }
}

/// A script attempted something outside its sandbox.
#[derive(Debug, Clone)]
pub struct SandboxViolation {
    pub kind: ViolationKind,

    /// What was attempted.
    pub description: String,

    /// Path involved (if applicable).
    pub path: Option<PathBuf>,
}

/// Types of sandbox violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    ReadDenied,
    WriteDenied,

    /// Path names something outside the root.
    PathEscape,

    /// `fs.delete` was pointed at a directory.
    DirectoryDelete,

    FileTooLarge,
}

impl std::fmt::Display for SandboxViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ViolationKind::ReadDenied => write!(f, "Read denied: {}", self.description),
            ViolationKind::WriteDenied => write!(f, "Write denied: {}", self.description),
            ViolationKind::PathEscape => {
                write!(f, "Path escapes content root: {}", self.description)
            }
            ViolationKind::DirectoryDelete => {
                write!(f, "Refusing to delete directory: {}", self.description)
            }
            ViolationKind::FileTooLarge => write!(f, "File too large: {}", self.description),
        }
    }
}

impl std::error::Error for SandboxViolation {}
