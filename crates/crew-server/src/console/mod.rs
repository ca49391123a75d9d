//! Authenticated admin console.
//!
//! A session is a sequence of text messages over any [`ConsoleTransport`]:
//!
//! ```text
//! server: Welcome
//! client: auth <secret>
//! server: OK                      (or "need auth", then close)
//! client: list
//! server: /srv/site
//!         /srv/site/docs
//!         ...
//! client: quit
//! server: bye
//! ```
//!
//! Unknown commands answer `unknown command` and keep the session open.

pub mod ws;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use crew_core::{ContentTree, Node, constant_time_eq};
use crew_render::RenderDispatcher;
use crew_render::rpc::BoxFuture;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

pub const WELCOME: &str = "Welcome";
pub const NEED_AUTH: &str = "need auth";
pub const AUTH_OK: &str = "OK";
pub const BYE: &str = "bye";
pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Errors that end a console session.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("console transport error: {0}")]
    Transport(String),

    /// A command task panicked or was cancelled.
    #[error("console command failed: {0}")]
    Command(String),
}

impl ConsoleError {
    pub fn transport(e: impl std::fmt::Display) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A bidirectional text channel.
pub trait ConsoleTransport: Send {
    fn send<'a>(&'a mut self, message: &'a str) -> BoxFuture<'a, Result<(), ConsoleError>>;

    /// Next message, or `None` once the peer has gone.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, ConsoleError>>;

    fn close(&mut self) -> BoxFuture<'_, Result<(), ConsoleError>>;
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Connected,
    Authenticating,
    Authorized,
    Serving,
    Closed,
}

/// Recognized commands, in the order `help` lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    Quit,
    Echo,
    Help,
    List,
    Stat,
    Kv,
    Scratch,
}

/// What to do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Continue(String),
    Quit,
}

/// Command interpreter bound to a site.
#[derive(Clone)]
pub struct AdminConsole {
    dispatcher: Arc<RenderDispatcher>,
    secret: String,
}

impl AdminConsole {
    pub fn new(dispatcher: Arc<RenderDispatcher>, secret: impl Into<String>) -> Self {
        Self {
            dispatcher,
            secret: secret.into(),
        }
    }

    /// Drive one session to completion.
    pub async fn run<T: ConsoleTransport>(&self, transport: &mut T) -> Result<(), ConsoleError> {
        let mut state = SessionState::Connected;
        loop {
            tracing::trace!(%state, "console");
            state = match state {
                SessionState::Connected => {
                    transport.send(WELCOME).await?;
                    SessionState::Authenticating
                }
                SessionState::Authenticating => match transport.recv().await? {
                    Some(line) if self.authenticate(&line) => SessionState::Authorized,
                    Some(_) => {
                        tracing::warn!("console authentication failed");
                        transport.send(NEED_AUTH).await?;
                        SessionState::Closed
                    }
                    None => SessionState::Closed,
                },
                SessionState::Authorized => {
                    tracing::info!("console session authorized");
                    transport.send(AUTH_OK).await?;
                    SessionState::Serving
                }
                SessionState::Serving => match transport.recv().await? {
                    Some(line) => match self.execute_blocking(line).await? {
                        Reply::Continue(message) => {
                            transport.send(&message).await?;
                            SessionState::Serving
                        }
                        Reply::Quit => {
                            transport.send(BYE).await?;
                            SessionState::Closed
                        }
                    },
                    None => SessionState::Closed,
                },
                SessionState::Closed => {
                    transport.close().await?;
                    return Ok(());
                }
            };
        }
    }

    /// `auth <secret>`, compared in constant time.
    pub fn authenticate(&self, line: &str) -> bool {
        let mut fields = line.split_whitespace();
        let is_auth = fields
            .next()
            .is_some_and(|cmd| cmd.eq_ignore_ascii_case("auth"));
        match (is_auth, fields.next()) {
            (true, Some(given)) => constant_time_eq(given.as_bytes(), self.secret.as_bytes()),
            _ => false,
        }
    }

    /// Run one command line on the blocking pool.
    async fn execute_blocking(&self, line: String) -> Result<Reply, ConsoleError> {
        let console = self.clone();
        tokio::task::spawn_blocking(move || console.execute(&line))
            .await
            .map_err(|e| ConsoleError::Command(e.to_string()))
    }

    /// Run one command line.
    pub fn execute(&self, line: &str) -> Reply {
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else {
            return Reply::Continue(UNKNOWN_COMMAND.to_string());
        };
        let args: Vec<&str> = fields.collect();
        let Ok(command) = Command::from_str(&name.to_ascii_lowercase()) else {
            return Reply::Continue(UNKNOWN_COMMAND.to_string());
        };
        tracing::debug!(%command, "console command");

        let message = match command {
            Command::Quit => return Reply::Quit,
            Command::Echo => args.join(" "),
            Command::Help => Command::iter()
                .map(|c| c.as_ref().to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Command::List => list_tree(self.dispatcher.tree()),
            Command::Stat => match args.first() {
                Some(url) => stat(self.dispatcher.tree(), url),
                None => "error: usage: stat <url>".to_string(),
            },
            Command::Kv => self.kv(&args),
            Command::Scratch => {
                let keys = self.dispatcher.scripts().scratch().keys();
                if keys.is_empty() {
                    "(empty)".to_string()
                } else {
                    keys.join("\n")
                }
            }
        };
        Reply::Continue(message)
    }

    fn kv(&self, args: &[&str]) -> String {
        let store = self.dispatcher.store();
        let result = match args {
            ["get", key] => store
                .get(key)
                .map(|value| String::from_utf8_lossy(&value).into_owned()),
            ["put", key, value @ ..] if !value.is_empty() => store
                .put(key, value.join(" ").as_bytes())
                .map(|()| AUTH_OK.to_string()),
            ["del", key] => store.delete(key).map(|()| AUTH_OK.to_string()),
            _ => return "error: usage: kv get <key> | kv put <key> <value> | kv del <key>".to_string(),
        };
        result.unwrap_or_else(|e| format!("error: {e}"))
    }
}

/// Every node's filesystem path, depth first, hidden nodes included.
pub fn list_tree(tree: &ContentTree) -> String {
    let mut paths = Vec::new();
    tree.walk(tree.root(), |node, _| {
        paths.push(node.path.display().to_string());
        true
    });
    paths.join("\n")
}

fn stat(tree: &ContentTree, url: &str) -> String {
    match tree.resolve_url(url) {
        Ok(node) => describe(tree, &node),
        Err(e) => format!("error: {e}"),
    }
}

fn describe(tree: &ContentTree, node: &Node) -> String {
    let modified = std::fs::metadata(&node.path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| "-".to_string());
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    [
        format!("url: {}", tree.url(node)),
        format!("path: {}", node.path.display()),
        format!("kind: {}", if node.is_dir { "dir" } else { "file" }),
        format!("title: {}", node.title),
        format!("type: {}", node.content_type),
        format!("hidden: {}", yes_no(node.hidden)),
        format!("bearer: {}", yes_no(node.bearer_token.is_some())),
        format!("basic: {}", yes_no(node.basic_credentials.is_some())),
        format!("modified: {modified}"),
    ]
    .join("\n")
}
