//! Page assembly and the HTML template.

use std::path::Path;

use crew_core::Node;
use tera::{Context, Tera};

use crate::error::RenderError;

/// The built-in page template.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/page.html");

/// Registered with an `.html` name so tera autoescapes plain variables;
/// `nav` and `body` are marked `safe` in the template.
const TEMPLATE_NAME: &str = "page.html";

/// Where a page's body comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodySource {
    /// The node's own content-type strategy.
    #[default]
    Node,

    /// The synthetic sitemap.
    Sitemap,
}

/// Site-wide strings shown on every page.
#[derive(Debug, Clone, Default)]
pub struct SiteInfo {
    pub name: String,
    pub subtitle: String,
}

/// A fully rendered page, ready for the template.
#[derive(Debug, Clone)]
pub struct Page {
    pub node: Node,
    pub title: String,
    pub headline: String,
    pub sub_headline: String,
    pub nav: String,
    pub body: String,
    pub source: BodySource,
}

/// Compiled page template.
#[derive(Debug)]
pub struct PageTemplate {
    tera: Tera,
}

impl PageTemplate {
    pub fn builtin() -> Result<Self, RenderError> {
        Self::from_source(DEFAULT_TEMPLATE)
    }

    /// Compile a template from source.
    pub fn from_source(source: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, source)?;
        Ok(Self { tera })
    }

    /// Load a custom template file.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let source = std::fs::read_to_string(path).map_err(|e| RenderError::io(path, e))?;
        tracing::info!(path = %path.display(), "using custom page template");
        Self::from_source(&source)
    }

    pub fn render(&self, page: &Page) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("title", &page.title);
        context.insert("headline", &page.headline);
        context.insert("sub_headline", &page.sub_headline);
        context.insert("nav", &page.nav);
        context.insert("body", &page.body);
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}
