//! Core types for crew.
//!
//! This crate maps a content directory onto URL space: it turns filesystem
//! entries into typed [`Node`]s (applying optional sidecar configuration),
//! orders siblings, answers ancestor queries, and enforces the per-node
//! access rules.

mod access;
mod config;
mod error;
mod node;
mod tree;

pub use access::{AccessError, AccessGuard, BASIC_REALM, Credentials, constant_time_eq};
pub use config::{BasicAuthConfig, NodeConfig, is_sidecar_name, sidecar_path};
pub use error::TreeError;
pub use node::{BasicCredentials, ContentType, Node};
pub use tree::{Ancestors, ContentTree, INDEX_FILES, is_reserved, sort_nodes};
