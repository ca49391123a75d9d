//! Shared application state.

use std::sync::Arc;

use crew_core::ContentTree;
use crew_render::{
    JsonRpcRenderer, KvStore, PageTemplate, RenderDispatcher, SiteInfo, SledStore,
};
use crew_script::{ScratchStore, ScriptRunner};

use crate::config::ServerConfig;
use crate::console::AdminConsole;
use crate::error::ServerError;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<RenderDispatcher>,
    console: Option<Arc<AdminConsole>>,
}

impl AppState {
    /// Wrap a dispatcher; `admin_secret` enables the console.
    pub fn new(dispatcher: RenderDispatcher, admin_secret: Option<String>) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let console = admin_secret.map(|secret| Arc::new(AdminConsole::new(dispatcher.clone(), secret)));
        Self {
            dispatcher,
            console,
        }
    }

    /// Open the content tree, storage and template named by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let tree = ContentTree::open(&config.root)?;
        let store: Arc<dyn KvStore> = Arc::new(SledStore::open(&config.storage)?);
        let remote = Arc::new(JsonRpcRenderer::new().map_err(|e| ServerError::config(e.to_string()))?);
        let scripts = ScriptRunner::new(config.sandbox(tree.root_path()), ScratchStore::new());

        let template = match &config.page_template {
            Some(path) => PageTemplate::load(path)?,
            None => PageTemplate::builtin()?,
        };
        let site = SiteInfo {
            name: config.site_name.clone(),
            subtitle: config.site_subtitle.clone(),
        };

        tracing::info!(
            root = %tree.root_path().display(),
            storage = %config.storage.display(),
            console = config.admin_secret.is_some(),
            "site opened"
        );
        let dispatcher = RenderDispatcher::new(tree, store, remote, scripts)?
            .with_template(template)
            .with_site(site);
        Ok(Self::new(dispatcher, config.admin_secret.clone()))
    }

    pub fn dispatcher(&self) -> &RenderDispatcher {
        &self.dispatcher
    }

    pub fn tree(&self) -> &ContentTree {
        self.dispatcher.tree()
    }

    /// The admin console, when a secret is configured.
    pub fn console(&self) -> Option<&Arc<AdminConsole>> {
        self.console.as_ref()
    }
}
