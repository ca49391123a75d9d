//! Content tree: path resolution, ordering and ancestry.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::config::{NodeConfig, is_sidecar_name, sidecar_path};
use crate::error::TreeError;
use crate::node::{ContentType, Node};

/// Index files a directory delegates to, in priority order.
pub const INDEX_FILES: [&str; 2] = ["index.html", "index.md"];

/// Extensions tried when a URL names a file without its extension.
const URL_EXTENSIONS: [&str; 2] = [".md", ".html"];

/// Whether a directory entry is kept out of listings.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with('.')
        || name.starts_with('_')
        || is_sidecar_name(name)
        || INDEX_FILES.contains(&name)
}

/// Sort siblings: directories first, then by title.
///
/// Navigation, the sitemap, directory listings and the admin console all go
/// through this one routine.
pub fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.title.cmp(&b.title).then_with(|| a.path.cmp(&b.path)),
    });
}

/// A content directory mapped onto URL space.
///
/// Nothing is cached: every query re-reads the filesystem, so the tree can be
/// shared freely between concurrent requests.
#[derive(Debug, Clone)]
pub struct ContentTree {
    root_path: PathBuf,
    root: Node,
}

impl ContentTree {
    /// Open a content root. The path must be an existing directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, TreeError> {
        let root = root.as_ref();
        let root_path = root.canonicalize().map_err(|e| TreeError::io(root, e))?;
        if !root_path.is_dir() {
            return Err(TreeError::config(
                &root_path,
                "content root is not a directory",
            ));
        }
        let root = resolve_path(&root_path)?;
        Ok(Self { root_path, root })
    }

    /// The root node, resolved once at startup.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Absolute path of the content root.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Resolve a filesystem path (absolute, or relative to the root).
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<Node, TreeError> {
        let path = path.as_ref();
        if path.is_absolute() {
            resolve_path(path)
        } else {
            resolve_path(&self.root_path.join(path))
        }
    }

    /// Resolve a request path such as `/docs/guide`.
    ///
    /// Segments are matched one level at a time: each is tried literally,
    /// then with underscores turned back into spaces. The last segment is
    /// also tried with a markup extension appended.
    pub fn resolve_url(&self, url: &str) -> Result<Node, TreeError> {
        let decoded = percent_decode_str(url).decode_utf8_lossy();
        let trimmed = decoded.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(self.root.clone());
        }

        let not_found = || TreeError::NotFound {
            path: self.root_path.join(trimmed),
        };
        let addressable = Path::new(trimmed).components().all(|c| match c {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                !name.starts_with('.') && !name.starts_with('_')
            }
            _ => false,
        });
        if !addressable {
            return Err(not_found());
        }

        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(not_found());
        };

        let mut dir = self.root_path.clone();
        for segment in parents {
            dir = segment_names(segment)
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_dir())
                .ok_or_else(not_found)?;
        }

        for name in segment_names(last) {
            let suffixes = std::iter::once("").chain(URL_EXTENSIONS);
            for ext in suffixes {
                match resolve_path(&dir.join(format!("{name}{ext}"))) {
                    Err(TreeError::NotFound { .. }) => continue,
                    other => return other,
                }
            }
        }
        Err(not_found())
    }

    /// Ordered children of a directory. Files have none.
    pub fn children(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        if !node.is_dir {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&node.path).map_err(|e| TreeError::io(&node.path, e))?;

        let mut nodes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TreeError::io(&node.path, e))?;
            let name = entry.file_name();
            if is_reserved(&name.to_string_lossy()) {
                continue;
            }
            match resolve_path(&entry.path()) {
                Ok(child) => nodes.push(child),
                // Dangling links and entries removed since the read.
                Err(TreeError::NotFound { path }) => {
                    tracing::warn!(path = %path.display(), "skipping vanished entry");
                }
                Err(e) => return Err(e),
            }
        }
        sort_nodes(&mut nodes);
        Ok(nodes)
    }

    /// Parent directory node, or `None` at the root.
    pub fn parent(&self, node: &Node) -> Result<Option<Node>, TreeError> {
        if node.path == self.root_path {
            return Ok(None);
        }
        match node.path.parent() {
            Some(parent) if parent.starts_with(&self.root_path) => {
                resolve_path(parent).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Walk from `node` up to the root, `node` included.
    pub fn ancestors<'a>(&'a self, node: &Node) -> Ancestors<'a> {
        Ancestors {
            tree: self,
            next: Some(Ok(node.clone())),
        }
    }

    /// URL of a node: `/` for the root, otherwise the root-relative path
    /// with spaces replaced by underscores.
    pub fn url(&self, node: &Node) -> String {
        let Ok(relative) = node.path.strip_prefix(&self.root_path) else {
            return "/".to_string();
        };
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().replace(' ', "_"))
            .collect();
        format!("/{}", segments.join("/"))
    }

    /// Index node of a directory (`index.html`, then `index.md`).
    pub fn index_of(&self, dir: &Node) -> Result<Option<Node>, TreeError> {
        if !dir.is_dir {
            return Ok(None);
        }
        for name in INDEX_FILES {
            match resolve_path(&dir.path.join(name)) {
                Ok(index) if !index.is_dir => return Ok(Some(index)),
                Ok(_) | Err(TreeError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Depth-first, pre-order traversal in sibling order.
    ///
    /// `visit` receives each node with its depth (0 for `node` itself).
    /// Returning `false` skips that node's subtree. Unreadable directories
    /// are logged and skipped.
    pub fn walk<F>(&self, node: &Node, mut visit: F)
    where
        F: FnMut(&Node, usize) -> bool,
    {
        self.walk_inner(node, 0, &mut visit);
    }

    fn walk_inner<F>(&self, node: &Node, depth: usize, visit: &mut F)
    where
        F: FnMut(&Node, usize) -> bool,
    {
        if !visit(node, depth) {
            return;
        }
        match self.children(node) {
            Ok(children) => {
                for child in &children {
                    self.walk_inner(child, depth + 1, visit);
                }
            }
            Err(e) => tracing::warn!(path = %node.path.display(), error = %e, "skipping subtree"),
        }
    }
}

/// Iterator over a node and its ancestors, nearest first.
pub struct Ancestors<'a> {
    tree: &'a ContentTree,
    next: Option<Result<Node, TreeError>>,
}

impl Iterator for Ancestors<'_> {
    type Item = Result<Node, TreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.next.take()?;
        if let Ok(node) = &item {
            self.next = self.tree.parent(node).transpose();
        }
        Some(item)
    }
}

/// File names a URL segment may stand for: literal, then with `_` as space.
fn segment_names(segment: &str) -> impl Iterator<Item = String> {
    let spaced = segment.replace('_', " ");
    let alternate = (spaced != segment).then_some(spaced);
    std::iter::once(segment.to_string()).chain(alternate)
}

/// Stat a path and overlay its sidecar config.
fn resolve_path(path: &Path) -> Result<Node, TreeError> {
    let metadata = std::fs::metadata(path).map_err(|e| TreeError::io(path, e))?;
    let mut node = Node::new(path, metadata.is_dir());

    let config = NodeConfig::load(path, node.is_dir)?;
    let explicit_type = config.as_ref().is_some_and(NodeConfig::has_type);
    if let Some(config) = config {
        let config_path = sidecar_path(path, node.is_dir);
        config.apply(&mut node, &config_path)?;
    }
    if !explicit_type && !node.is_dir && node.extension().as_deref() == Some("lua") {
        node.content_type = ContentType::Script;
    }
    Ok(node)
}
