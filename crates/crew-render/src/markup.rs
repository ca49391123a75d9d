//! Markdown to HTML.

use pulldown_cmark::{Options, Parser, html::push_html};

/// Render markdown to HTML with GFM tables, strikethrough and task lists.
///
/// Raw HTML passes through unchanged.
pub fn render_markdown(content: &str) -> String {
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES;
    let parser = Parser::new_ext(content, options);

    let mut html = String::with_capacity(content.len() * 2);
    push_html(&mut html, parser);
    html
}
