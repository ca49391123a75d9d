use crew_core::{
    AccessError, AccessGuard, ContentTree, ContentType, Credentials, TreeError,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn site() -> (TempDir, ContentTree) {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "b.md", "# b");
    write(root, "c.md", "# c");
    fs::create_dir_all(root.join("a")).unwrap();
    write(root, "a/inner.md", "inner");
    write(root, "index.md", "home");
    write(root, ".git/HEAD", "ref");
    write(root, "_static/style.css", "body{}");
    let tree = ContentTree::open(root).unwrap();
    (temp, tree)
}

#[test]
fn test_children_order_and_reserved() {
    let (_temp, tree) = site();
    let children = tree.children(tree.root()).unwrap();
    let titles: Vec<_> = children.iter().map(|n| n.title.to_string()).collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
    assert!(children[0].is_dir);
}

#[test]
fn test_children_of_file_is_empty() {
    let (_temp, tree) = site();
    let file = tree.resolve("b.md").unwrap();
    assert!(tree.children(&file).unwrap().is_empty());
}

#[test]
fn test_missing_path_is_not_found() {
    let (_temp, tree) = site();
    let err = tree.resolve("nope.md").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_malformed_sidecar_is_config_error() {
    let (temp, tree) = site();
    write(temp.path(), "_b.md.conf.json", "{ not json");
    let err = tree.resolve("b.md").unwrap_err();
    assert!(matches!(err, TreeError::Config { .. }));
}

#[test]
fn test_unknown_type_is_config_error() {
    let (temp, tree) = site();
    write(temp.path(), "_c.md.conf.json", r#"{"type": "gopher"}"#);
    let err = tree.resolve("c.md").unwrap_err();
    assert!(matches!(err, TreeError::Config { .. }));
}

#[test]
fn test_sidecar_overrides_title_and_order() {
    let (temp, tree) = site();
    write(temp.path(), "_c.md.conf.json", r#"{"title": "aardvark"}"#);
    let titles: Vec<_> = tree
        .children(tree.root())
        .unwrap()
        .iter()
        .map(|n| n.title.to_string())
        .collect();
    assert_eq!(titles, vec!["a", "aardvark", "b"]);
}

#[test]
fn test_url_mapping() {
    let (temp, tree) = site();
    write(temp.path(), "my notes/first day.md", "x");

    assert_eq!(tree.url(tree.root()), "/");
    let node = tree.resolve("my notes/first day.md").unwrap();
    assert_eq!(tree.url(&node), "/my_notes/first_day.md");
}

#[test]
fn test_url_resolve_round_trip() {
    let (temp, tree) = site();
    write(temp.path(), "my notes/first day.md", "x");

    let mut urls = Vec::new();
    tree.walk(tree.root(), |node, _| {
        urls.push(tree.url(node));
        true
    });
    assert!(urls.len() >= 5);
    for url in urls {
        let node = tree.resolve_url(&url).unwrap();
        assert_eq!(tree.url(&node), url);
    }
}

#[test]
fn test_url_round_trip_mixed_underscore_and_space() {
    let (temp, tree) = site();
    write(temp.path(), "x_y/a b.md", "x");

    let node = tree.resolve("x_y/a b.md").unwrap();
    let url = tree.url(&node);
    assert_eq!(url, "/x_y/a_b.md");

    let resolved = tree.resolve_url(&url).unwrap();
    assert_eq!(resolved.path, node.path);
    assert_eq!(tree.resolve_url("/x_y/").unwrap().path, tree.root_path().join("x_y"));
}

#[cfg(unix)]
#[test]
fn test_children_skip_dangling_link() {
    let (temp, tree) = site();
    write(temp.path(), "about.md", "# About");
    std::os::unix::fs::symlink("gone.md", temp.path().join("link.md")).unwrap();

    let children = tree.children(tree.root()).unwrap();
    assert!(children.iter().any(|c| c.title == "about"));
    assert!(children.iter().all(|c| c.title != "link"));
    assert!(tree.resolve_url("/link.md").unwrap_err().is_not_found());
}

#[test]
fn test_resolve_url_without_extension() {
    let (temp, tree) = site();
    write(temp.path(), "docs/guide.md", "# Guide");

    let node = tree.resolve_url("/docs/guide").unwrap();
    assert_eq!(node.title, "guide");
    assert!(node.is_markdown());

    let dir = tree.resolve_url("/docs/").unwrap();
    assert!(dir.is_dir);
}

#[test]
fn test_resolve_url_rejects_escape_and_reserved() {
    let (_temp, tree) = site();
    assert!(tree.resolve_url("/../etc/passwd").unwrap_err().is_not_found());
    assert!(tree.resolve_url("/_static/style.css").unwrap_err().is_not_found());
    assert!(tree.resolve_url("/.git/HEAD").unwrap_err().is_not_found());
}

#[test]
fn test_parent_and_ancestors() {
    let (_temp, tree) = site();
    assert!(tree.parent(tree.root()).unwrap().is_none());

    let inner = tree.resolve("a/inner.md").unwrap();
    let chain: Vec<String> = tree
        .ancestors(&inner)
        .map(|n| tree.url(&n.unwrap()))
        .collect();
    assert_eq!(chain, vec!["/a/inner.md", "/a", "/"]);
}

#[test]
fn test_hidden_node_is_resolvable() {
    let (temp, tree) = site();
    write(temp.path(), "_b.md.conf.json", r#"{"hidden": true}"#);
    let node = tree.resolve_url("/b.md").unwrap();
    assert!(node.hidden);
}

#[test]
fn test_lua_files_default_to_script() {
    let (temp, tree) = site();
    write(temp.path(), "app.lua", "function render() return 200, 'hi' end");
    write(temp.path(), "plain.lua", "-- shown as source");
    write(temp.path(), "_plain.lua.conf.json", r#"{"type": "file"}"#);

    assert_eq!(tree.resolve("app.lua").unwrap().content_type, ContentType::Script);
    assert_eq!(tree.resolve("plain.lua").unwrap().content_type, ContentType::Static);
}

#[test]
fn test_index_of() {
    let (_temp, tree) = site();
    let index = tree.index_of(tree.root()).unwrap().unwrap();
    assert_eq!(index.file_name(), "index.md");

    let a = tree.resolve("a").unwrap();
    assert!(tree.index_of(&a).unwrap().is_none());
}

#[test]
fn test_walk_skips_subtree() {
    let (_temp, tree) = site();
    let mut seen = Vec::new();
    tree.walk(tree.root(), |node, depth| {
        seen.push((tree.url(node), depth));
        !node.is_dir || depth == 0
    });
    assert_eq!(
        seen,
        vec![
            ("/".to_string(), 0),
            ("/a".to_string(), 1),
            ("/b.md".to_string(), 1),
            ("/c.md".to_string(), 1),
        ]
    );
}

#[test]
fn test_basic_auth_inherited_from_grandparent() {
    let (temp, tree) = site();
    write(temp.path(), "private/_.conf.json", r#"{"basic_auth": {"username": "ops", "password": "pw"}}"#);
    write(temp.path(), "private/team/notes.md", "secret");

    let node = tree.resolve_url("/private/team/notes").unwrap();
    let guard = AccessGuard::new(&tree);

    let err = guard.authorize(&node, &Credentials::none()).unwrap_err();
    assert!(matches!(err, AccessError::Basic { .. }));
    assert!(err.challenge().is_some());

    let wrong = Credentials::none().with_basic("ops", "nope");
    assert!(guard.authorize(&node, &wrong).is_err());

    let right = Credentials::none().with_basic("ops", "pw");
    assert!(guard.authorize(&node, &right).is_ok());
}

#[test]
fn test_nearest_basic_rule_wins() {
    let (temp, tree) = site();
    write(temp.path(), "private/_.conf.json", r#"{"basic_auth": {"username": "outer", "password": "o"}}"#);
    write(temp.path(), "private/team/_.conf.json", r#"{"basic_auth": {"username": "inner", "password": "i"}}"#);
    write(temp.path(), "private/team/notes.md", "secret");

    let node = tree.resolve("private/team/notes.md").unwrap();
    let guard = AccessGuard::new(&tree);

    assert!(guard.authorize(&node, &Credentials::none().with_basic("inner", "i")).is_ok());
    assert!(guard.authorize(&node, &Credentials::none().with_basic("outer", "o")).is_err());
}

#[test]
fn test_bearer_applies_to_target_only() {
    let (temp, tree) = site();
    write(temp.path(), "api/_.conf.json", r#"{"auth_token": "t0k"}"#);
    write(temp.path(), "api/open.md", "open");

    let guard = AccessGuard::new(&tree);
    let dir = tree.resolve("api").unwrap();
    let child = tree.resolve("api/open.md").unwrap();

    let err = guard.authorize(&dir, &Credentials::none()).unwrap_err();
    assert!(matches!(err, AccessError::Bearer { .. }));
    assert!(err.challenge().is_none());
    assert!(guard.authorize(&dir, &Credentials::none().with_bearer("t0k")).is_ok());
    assert!(guard.authorize(&child, &Credentials::none()).is_ok());
}

#[test]
fn test_bearer_checked_before_basic() {
    let (temp, tree) = site();
    write(temp.path(), "_b.md.conf.json", r#"{"auth_token": "t", "basic_auth": {"username": "u", "password": "p"}}"#);
    let node = tree.resolve("b.md").unwrap();
    let guard = AccessGuard::new(&tree);

    let only_basic = Credentials::none().with_basic("u", "p");
    assert!(matches!(
        guard.authorize(&node, &only_basic).unwrap_err(),
        AccessError::Bearer { .. }
    ));

    let only_bearer = Credentials::none().with_bearer("t");
    assert!(matches!(
        guard.authorize(&node, &only_bearer).unwrap_err(),
        AccessError::Basic { .. }
    ));

    let both = Credentials::none().with_bearer("t").with_basic("u", "p");
    assert!(guard.authorize(&node, &both).is_ok());
}
