//! Per-node rendering strategy dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use crew_core::{ContentTree, ContentType, Node, TreeError};
use crew_script::{ScriptRequest, ScriptResponse, ScriptRunner};

use crate::error::RenderError;
use crate::markup::render_markdown;
use crate::nav;
use crate::page::{BodySource, Page, PageTemplate, SiteInfo};
use crate::rpc::RemoteRender;
use crate::store::KvStore;

/// What a request asked for.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Upper-case HTTP method.
    pub method: String,

    /// Request path as received.
    pub url: String,

    /// Lower-case header names.
    pub headers: HashMap<String, String>,

    pub query: HashMap<String, String>,

    /// Query merged with body parameters; body keys win.
    pub params: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Set the query string parameters (which also seed `params`).
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.params.extend(query.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.query = query;
        self
    }

    /// Overlay decoded body parameters.
    pub fn with_body_params(mut self, body: HashMap<String, String>) -> Self {
        self.params.extend(body);
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// `raw=1` or `raw=true` asks for the untemplated bytes.
    pub fn is_raw(&self) -> bool {
        matches!(self.params.get("raw").map(String::as_str), Some("1" | "true"))
    }

    fn script_request(&self) -> ScriptRequest {
        ScriptRequest {
            method: self.method.clone(),
            path: self.url.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            params: self.params.clone(),
        }
    }
}

/// Result of dispatching a request to a node.
#[derive(Debug)]
pub enum Rendered {
    /// A templated HTML page.
    Page(String),

    /// Raw node bytes.
    Raw(Vec<u8>),

    /// A script's own status and body (POST/PUT).
    Script(ScriptResponse),
}

/// Picks and runs the rendering strategy for a node.
pub struct RenderDispatcher {
    tree: Arc<ContentTree>,
    store: Arc<dyn KvStore>,
    remote: Arc<dyn RemoteRender>,
    scripts: ScriptRunner,
    template: PageTemplate,
    site: SiteInfo,
}

impl RenderDispatcher {
    pub fn new(
        tree: ContentTree,
        store: Arc<dyn KvStore>,
        remote: Arc<dyn RemoteRender>,
        scripts: ScriptRunner,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            tree: Arc::new(tree),
            store,
            remote,
            scripts,
            template: PageTemplate::builtin()?,
            site: SiteInfo::default(),
        })
    }

    pub fn with_template(mut self, template: PageTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_site(mut self, site: SiteInfo) -> Self {
        self.site = site;
        self
    }

    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    /// Owned handle for work moved off the async workers.
    pub fn shared_tree(&self) -> Arc<ContentTree> {
        Arc::clone(&self.tree)
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn scripts(&self) -> &ScriptRunner {
        &self.scripts
    }

    /// Answer a request for `node`.
    ///
    /// GET/HEAD render a page (or raw bytes). POST/PUT are accepted only by
    /// script nodes, whose response passes through untouched.
    pub async fn dispatch(&self, node: &Node, ctx: &RequestContext) -> Result<Rendered, RenderError> {
        let read_only = matches!(ctx.method.as_str(), "GET" | "HEAD");
        let mutating = matches!(ctx.method.as_str(), "POST" | "PUT");
        if !read_only && !(mutating && node.content_type == ContentType::Script) {
            return Err(RenderError::MethodNotAllowed {
                method: ctx.method.clone(),
                url: self.tree.url(node),
            });
        }

        if ctx.is_raw() {
            return Ok(Rendered::Raw(self.raw(node).await?));
        }
        if mutating {
            return Ok(Rendered::Script(self.run_script(node, ctx).await?));
        }
        Ok(Rendered::Page(
            self.render_page(node, ctx, BodySource::Node).await?,
        ))
    }

    /// Underlying bytes of a node; a directory yields its index file.
    pub async fn raw(&self, node: &Node) -> Result<Vec<u8>, RenderError> {
        let file = if node.is_dir {
            let dir = node.clone();
            self.blocking(move |tree| {
                tree.index_of(&dir)?
                    .ok_or(RenderError::Tree(TreeError::NotFound { path: dir.path }))
            })
            .await?
        } else {
            node.clone()
        };
        read_bytes(&file).await
    }

    /// Body plus navigation, through the page template.
    pub async fn render_page(
        &self,
        node: &Node,
        ctx: &RequestContext,
        source: BodySource,
    ) -> Result<String, RenderError> {
        let (title, body) = match source {
            BodySource::Node => (node.title.to_string(), self.render_body(node, ctx).await?),
            BodySource::Sitemap => (
                "Site map".to_string(),
                self.blocking(|tree| Ok(nav::sitemap(tree))).await?,
            ),
        };
        let url = self.tree.url(node);
        let target = node.clone();
        let nav = self
            .blocking(move |tree| {
                nav::navigation(tree, &target).map_err(|source| RenderError::Navigation { url, source })
            })
            .await?;

        let page = Page {
            node: node.clone(),
            title,
            headline: self.site.name.clone(),
            sub_headline: self.site.subtitle.clone(),
            nav,
            body,
            source,
        };
        self.template.render(&page)
    }

    /// The sitemap page, bound to the root.
    pub async fn render_sitemap(&self, ctx: &RequestContext) -> Result<String, RenderError> {
        let root = self.tree.root().clone();
        self.render_page(&root, ctx, BodySource::Sitemap).await
    }

    /// Run the node's content-type strategy.
    pub async fn render_body(&self, node: &Node, ctx: &RequestContext) -> Result<String, RenderError> {
        match node.content_type {
            ContentType::Static => self.render_static(node).await,
            ContentType::KeyValue => Ok(self.render_kv(node).await),
            ContentType::RemoteProcedure => self.render_remote(node, ctx).await,
            ContentType::Script => {
                let name = self.tree.url(node);
                let response = self.run_script(node, ctx).await?;
                Ok(response.into_page_body(&name)?)
            }
        }
    }

    async fn render_static(&self, node: &Node) -> Result<String, RenderError> {
        if !node.is_dir {
            return render_file(node).await;
        }
        let dir = node.clone();
        let index = self.blocking(move |tree| Ok(tree.index_of(&dir)?)).await?;
        match index {
            Some(index) => render_file(&index).await,
            None => {
                let dir = node.clone();
                self.blocking(move |tree| Ok(nav::listing(tree, &dir)?)).await
            }
        }
    }

    /// A failed lookup becomes the body; it never fails the page.
    async fn render_kv(&self, node: &Node) -> String {
        let key = node
            .routing_key
            .clone()
            .unwrap_or_else(|| self.tree.url(node));
        let store = Arc::clone(&self.store);
        let lookup_key = key.clone();
        let result = tokio::task::spawn_blocking(move || store.get(&lookup_key))
            .await
            .map_err(|e| e.to_string())
            .and_then(|value| value.map_err(|e| e.to_string()));
        match result {
            Ok(value) => String::from_utf8_lossy(&value).into_owned(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "kv lookup failed");
                format!("error: {e}")
            }
        }
    }

    /// Run filesystem work against the tree on the blocking pool.
    async fn blocking<T, F>(&self, work: F) -> Result<T, RenderError>
    where
        T: Send + 'static,
        F: FnOnce(&ContentTree) -> Result<T, RenderError> + Send + 'static,
    {
        let tree = Arc::clone(&self.tree);
        tokio::task::spawn_blocking(move || work(&tree))
            .await
            .map_err(|e| RenderError::Join(e.to_string()))?
    }

    async fn render_remote(&self, node: &Node, ctx: &RequestContext) -> Result<String, RenderError> {
        let url = self.tree.url(node);
        let Some(endpoint) = node.remote_endpoint.as_deref() else {
            return Err(RenderError::MissingEndpoint { url });
        };
        self.remote
            .render(endpoint, &url, &ctx.params)
            .await
            .map_err(|source| RenderError::Rpc { url, source })
    }

    async fn run_script(&self, node: &Node, ctx: &RequestContext) -> Result<ScriptResponse, RenderError> {
        let source = tokio::fs::read(&node.path)
            .await
            .map_err(|e| RenderError::io(&node.path, e))?;
        let name = self.tree.url(node);
        Ok(self
            .scripts
            .run(&name, source, ctx.script_request())
            .await?)
    }
}

async fn read_bytes(node: &Node) -> Result<Vec<u8>, RenderError> {
    tokio::fs::read(&node.path)
        .await
        .map_err(|e| RenderError::io(&node.path, e))
}

/// Markdown is converted, everything else is passed through.
async fn render_file(node: &Node) -> Result<String, RenderError> {
    let bytes = read_bytes(node).await?;
    let text = String::from_utf8_lossy(&bytes);
    if node.is_markdown() {
        Ok(render_markdown(&text))
    } else {
        Ok(text.into_owned())
    }
}
