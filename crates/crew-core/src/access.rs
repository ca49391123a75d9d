//! Per-node access rules.
//!
//! Two independent checks guard every node:
//!
//! - **Bearer**: a token declared on the target node itself. Not inherited.
//! - **Basic**: the nearest node on the walk target → parent → … → root that
//!   declares basic credentials. Only that one rule is enforced.
//!
//! Bearer is checked first; either failure stops the request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::error::TreeError;
use crate::node::{BasicCredentials, Node};
use crate::tree::ContentTree;

/// Realm advertised in basic-auth challenges.
pub const BASIC_REALM: &str = "crew";

/// Why a request was refused.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Missing or wrong bearer token on the target node.
    #[error("Unauthorized: bearer token required for {url}")]
    Bearer { url: String },

    /// Missing or wrong basic credentials for the nearest protected ancestor.
    #[error("Unauthorized: credentials required by {url}")]
    Basic { url: String },

    /// The ancestor walk itself failed.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl AccessError {
    /// `WWW-Authenticate` value to send back, if any.
    pub fn challenge(&self) -> Option<String> {
        match self {
            Self::Basic { .. } => Some(format!("Basic realm=\"{BASIC_REALM}\"")),
            _ => None,
        }
    }

    /// Whether this is a credential failure rather than a lookup failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Bearer { .. } | Self::Basic { .. })
    }
}

/// Credentials presented with a request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bearer: Option<String>,
    pub basic: Option<BasicCredentials>,
}

impl Credentials {
    /// No credentials.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse `Authorization` header values. Malformed values are ignored.
    pub fn from_authorization<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut creds = Self::default();
        for value in values {
            let Some((scheme, rest)) = value.trim().split_once(' ') else {
                continue;
            };
            let rest = rest.trim();
            if scheme.eq_ignore_ascii_case("bearer") {
                creds.bearer = Some(rest.to_string());
            } else if scheme.eq_ignore_ascii_case("basic") {
                creds.basic = decode_basic(rest);
            }
        }
        creds
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_basic(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic = Some(BasicCredentials::new(username, password));
        self
    }
}

fn decode_basic(encoded: &str) -> Option<BasicCredentials> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(BasicCredentials::new(username, password))
}

/// Authorization checks against a content tree.
pub struct AccessGuard<'a> {
    tree: &'a ContentTree,
}

impl<'a> AccessGuard<'a> {
    pub fn new(tree: &'a ContentTree) -> Self {
        Self { tree }
    }

    /// Check `creds` against the rules that apply to `node`.
    pub fn authorize(&self, node: &Node, creds: &Credentials) -> Result<(), AccessError> {
        if let Some(expected) = &node.bearer_token {
            let presented = creds.bearer.as_deref().unwrap_or_default();
            if !constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
                return Err(AccessError::Bearer {
                    url: self.tree.url(node),
                });
            }
        }

        if let Some((rule_node, required)) = self.nearest_basic_rule(node)? {
            let accepted = creds.basic.as_ref().is_some_and(|given| {
                constant_time_eq(given.username.as_bytes(), required.username.as_bytes())
                    & constant_time_eq(given.password.as_bytes(), required.password.as_bytes())
            });
            if !accepted {
                tracing::debug!(rule = %rule_node.path.display(), "basic auth rejected");
                return Err(AccessError::Basic {
                    url: self.tree.url(node),
                });
            }
        }

        Ok(())
    }

    /// The closest node (target included) declaring basic credentials.
    fn nearest_basic_rule(
        &self,
        node: &Node,
    ) -> Result<Option<(Node, BasicCredentials)>, TreeError> {
        for ancestor in self.tree.ancestors(node) {
            let mut ancestor = ancestor?;
            if let Some(required) = ancestor.basic_credentials.take() {
                return Ok(Some((ancestor, required)));
            }
        }
        Ok(None)
    }
}

/// Byte equality whose running time depends only on the lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
