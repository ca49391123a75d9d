//! Navigation fragment, sitemap and directory listings.
//!
//! All three list children in [`ContentTree::children`] order and leave out
//! hidden nodes.

use std::fmt::Write;

use crew_core::{ContentTree, Node, TreeError};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tera::escape_html;

/// Bytes encoded in `href` values; `/` stays as is.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn href(url: &str) -> String {
    utf8_percent_encode(url, HREF).to_string()
}

/// Render the root-to-target navigation tree.
///
/// Every level lists the visible siblings. The target and its ancestors
/// are marked with `»` (the target in bold, ancestors in italics) and
/// ancestor directories expand inline; everything else gets `›`.
pub fn navigation(tree: &ContentTree, target: &Node) -> Result<String, TreeError> {
    let mut out = String::new();
    nav_level(tree, tree.root(), target, &mut out)?;
    Ok(out)
}

fn nav_level(
    tree: &ContentTree,
    dir: &Node,
    target: &Node,
    out: &mut String,
) -> Result<(), TreeError> {
    out.push_str("<ul>");
    for child in tree.children(dir)? {
        if child.hidden {
            continue;
        }
        // Path::starts_with compares whole components.
        let on_path = target.path.starts_with(&child.path);
        let title = format!(
            "{}{}",
            escape_html(&child.title),
            if child.is_dir { "/" } else { "" }
        );
        let label = if child.path == target.path {
            format!("» <b>{title}</b>")
        } else if on_path {
            format!("» <i>{title}</i>")
        } else {
            format!("› {title}")
        };

        let _ = write!(
            out,
            "<li><a href=\"{}\">{label}</a>",
            href(&tree.url(&child))
        );
        if child.is_dir && on_path {
            nav_level(tree, &child, target, out)?;
        }
        out.push_str("</li>");
    }
    out.push_str("</ul>");
    Ok(())
}

/// Render the sitemap body: a heading and the whole visible tree.
pub fn sitemap(tree: &ContentTree) -> String {
    let mut out = String::from("<h1>Site map</h1>\n");
    let mut open = 0usize;

    tree.walk(tree.root(), |node, depth| {
        if depth == 0 {
            return true;
        }
        if node.hidden {
            return false;
        }
        if open < depth {
            out.push_str("<ul>");
            open = depth;
        } else {
            out.push_str("</li>");
            while open > depth {
                out.push_str("</ul></li>");
                open -= 1;
            }
        }
        out.push_str("<li>");
        push_entry(&mut out, tree, node);
        true
    });

    if open > 0 {
        out.push_str("</li>");
        while open > 0 {
            out.push_str("</ul>");
            open -= 1;
            if open > 0 {
                out.push_str("</li>");
            }
        }
    }
    out
}

/// Synthetic body for a directory with no index file.
pub fn listing(tree: &ContentTree, dir: &Node) -> Result<String, TreeError> {
    let mut out = String::new();
    let _ = write!(out, "<h1>{}</h1>\n<ul>", href(&tree.url(dir)));
    for child in tree.children(dir)? {
        if child.hidden {
            continue;
        }
        out.push_str("<li>");
        push_entry(&mut out, tree, &child);
        out.push_str("</li>");
    }
    out.push_str("</ul>");
    Ok(out)
}

/// `<a href="url/">title/</a> description` for directories, no slash for files.
fn push_entry(out: &mut String, tree: &ContentTree, node: &Node) {
    let slash = if node.is_dir { "/" } else { "" };
    let _ = write!(
        out,
        "<a href=\"{}{slash}\">{}{slash}</a>",
        href(&tree.url(node)),
        escape_html(&node.title),
    );
    if !node.description.is_empty() {
        let _ = write!(out, " {}", escape_html(&node.description));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site(files: &[&str]) -> (TempDir, ContentTree) {
        let temp = TempDir::new().unwrap();
        for rel in files {
            let path = temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        let tree = ContentTree::open(temp.path()).unwrap();
        (temp, tree)
    }

    #[test]
    fn test_navigation_marks_path() {
        let (_temp, tree) = site(&["docs/guide.md", "docs/faq.md", "about.md"]);
        let guide = tree.resolve("docs/guide.md").unwrap();
        let nav = navigation(&tree, &guide).unwrap();

        assert_eq!(
            nav,
            "<ul>\
             <li><a href=\"/docs\">» <i>docs/</i></a>\
             <ul><li><a href=\"/docs/faq.md\">› faq</a></li>\
             <li><a href=\"/docs/guide.md\">» <b>guide</b></a></li></ul>\
             </li>\
             <li><a href=\"/about.md\">› about</a></li>\
             </ul>"
        );
    }

    #[test]
    fn test_navigation_ancestry_by_component() {
        let (_temp, tree) = site(&["doc/a.md", "docs/b.md"]);
        let b = tree.resolve("docs/b.md").unwrap();
        let nav = navigation(&tree, &b).unwrap();
        assert!(nav.contains("› doc/"));
        assert!(nav.contains("» <i>docs/</i>"));
        assert!(!nav.contains("a.md"));
    }

    #[test]
    fn test_sitemap_nesting() {
        let (_temp, tree) = site(&["a/x.md", "b.md"]);
        let map = sitemap(&tree);
        assert_eq!(
            map,
            "<h1>Site map</h1>\n\
             <ul><li><a href=\"/a/\">a/</a>\
             <ul><li><a href=\"/a/x.md\">x</a></li></ul></li>\
             <li><a href=\"/b.md\">b</a></li></ul>"
        );
    }

    #[test]
    fn test_titles_escaped_and_hrefs_encoded() {
        let (temp, tree) = site(&["100% done.md", "qa.md"]);
        fs::write(temp.path().join("_qa.md.conf.json"), r#"{"title": "Q&A <beta>"}"#).unwrap();
        let map = sitemap(&tree);
        assert!(map.contains("<a href=\"/100%25_done.md\">100% done</a>"));
        assert!(map.contains(">Q&amp;A &lt;beta&gt;</a>"));
        assert_eq!(href("/a/b"), "/a/b");
    }

    #[test]
    fn test_sitemap_empty_site() {
        let (_temp, tree) = site(&[]);
        assert_eq!(sitemap(&tree), "<h1>Site map</h1>\n");
    }

    #[test]
    fn test_listing() {
        let (temp, tree) = site(&["notes/one.md", "notes/sub/two.md"]);
        fs::write(temp.path().join("notes/_one.md.conf.json"), r#"{"desc": "first"}"#).unwrap();
        let dir = tree.resolve("notes").unwrap();
        let html = listing(&tree, &dir).unwrap();
        assert_eq!(
            html,
            "<h1>/notes</h1>\n<ul>\
             <li><a href=\"/notes/sub/\">sub/</a></li>\
             <li><a href=\"/notes/one.md\">one</a> first</li></ul>"
        );
    }
}
