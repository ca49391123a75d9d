use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crew_core::ContentTree;
use crew_render::rpc::BoxFuture;
use crew_render::{MemoryStore, RemoteRender, RenderDispatcher, RpcError};
use crew_script::{SandboxConfig, ScratchStore, ScriptRunner};
use crew_server::{AppState, build_router};
use tempfile::TempDir;
use tower::ServiceExt;

struct NoRemote;

impl RemoteRender for NoRemote {
    fn render<'a>(
        &'a self,
        _endpoint: &'a str,
        _url: &'a str,
        _params: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, RpcError>> {
        Box::pin(async { Err(RpcError::Status { status: 503 }) })
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn site() -> TempDir {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "about.md", "# About\n\nWe make *things*.");
    write(temp.path(), "docs/guide.md", "# Guide");
    write(temp.path(), "private/_.conf.json", r#"{"basic_auth": {"username": "ops", "password": "pw"}}"#);
    write(temp.path(), "private/plans.md", "# Plans");
    write(temp.path(), "_static/site.css", "body { margin: 0 }");
    write(temp.path(), "_static/fonts/x.woff2", "font");
    write(
        temp.path(),
        "form.lua",
        r#"
        function render() return 200, "<form></form>" end
        function post(req) return 201, "stored " .. req.params.id .. " " .. req.params.msg end
        function put(req) return 42, "nope" end
        "#,
    );
    temp
}

fn app(root: &Path, secret: Option<&str>) -> Router {
    build_router(state(root, secret))
}

fn state(root: &Path, secret: Option<&str>) -> AppState {
    let tree = ContentTree::open(root).unwrap();
    let scripts = ScriptRunner::new(
        SandboxConfig::new(tree.root_path()).with_timeout(1000),
        ScratchStore::new(),
    );
    let dispatcher =
        RenderDispatcher::new(tree, Arc::new(MemoryStore::new()), Arc::new(NoRemote), scripts).unwrap();
    AppState::new(dispatcher, secret.map(str::to_string))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_page_served() {
    let temp = site();
    let app = app(temp.path(), None);

    let response = get(&app, "/about.md").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let body = text(response).await;
    assert!(body.contains("<em>things</em>"));
    assert!(body.contains("» <b>about</b>"));
}

#[tokio::test]
async fn test_missing_node_is_404() {
    let temp = site();
    let app = app(temp.path(), None);

    let response = get(&app, "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(response).await, "404 page not found");
}

#[tokio::test]
async fn test_basic_auth_challenge() {
    let temp = site();
    let app = app(temp.path(), None);

    let response = get(&app, "/private/plans.md").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"crew\""
    );

    let wrong = format!("Basic {}", STANDARD.encode("ops:nope"));
    let request = Request::get("/private/plans.md")
        .header(header::AUTHORIZATION, wrong)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::UNAUTHORIZED);

    let right = format!("Basic {}", STANDARD.encode("ops:pw"));
    let request = Request::get("/private/plans.md")
        .header(header::AUTHORIZATION, right)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("<h1>Plans</h1>"));
}

#[tokio::test]
async fn test_post_to_static_node_is_405() {
    let temp = site();
    let app = app(temp.path(), None);

    let request = Request::post("/about.md").body(Body::empty()).unwrap();
    assert_eq!(
        send(&app, request).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    let request = Request::delete("/form.lua").body(Body::empty()).unwrap();
    assert_eq!(
        send(&app, request).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn test_script_post_json_and_form() {
    let temp = site();
    let app = app(temp.path(), None);

    let request = Request::post("/form.lua")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"id": 7, "msg": "hi"}"#))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(text(response).await, "stored 7 hi");

    let request = Request::post("/form.lua?id=1")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("id=2&msg=hello+you"))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(text(response).await, "stored 2 hello you");

    let request = Request::post("/form.lua")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("[1]"))
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_script_invalid_status_is_500() {
    let temp = site();
    let app = app(temp.path(), None);

    let request = Request::put("/form.lua").body(Body::empty()).unwrap();
    assert_eq!(
        send(&app, request).await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn test_rpc_failure_is_500() {
    let temp = site();
    write(temp.path(), "live", "");
    write(temp.path(), "_live.conf.json", r#"{"type": "rpc", "rpc_endpoint": "http://render.local"}"#);
    let app = app(temp.path(), None);

    assert_eq!(
        get(&app, "/live").await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn test_raw_source() {
    let temp = site();
    let app = app(temp.path(), None);

    let response = get(&app, "/about.md?raw=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(text(response).await, "# About\n\nWe make *things*.");
}

#[tokio::test]
async fn test_static_files() {
    let temp = site();
    write(temp.path(), "secret.txt", "top secret");
    let app = app(temp.path(), None);

    let response = get(&app, "/_static/site.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/css; charset=utf-8"
    );
    assert_eq!(text(response).await, "body { margin: 0 }");

    assert_eq!(get(&app, "/_static/fonts/x.woff2").await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/_static/missing.js").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/_static/fonts").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        get(&app, "/_static/..%2Fsecret.txt").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_sitemap_route() {
    let temp = site();
    let app = app(temp.path(), None);

    let response = get(&app, "/sitemap").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(body.contains("<h1>Site map</h1>"));
    assert!(body.contains("href=\"/docs/guide.md\""));
    assert!(!body.contains("href=\"/_static\""));
    assert!(!body.contains("site.css</a>"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_link_does_not_break_pages() {
    let temp = site();
    std::os::unix::fs::symlink("gone.md", temp.path().join("link.md")).unwrap();
    let app = app(temp.path(), None);

    let response = get(&app, "/about.md").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!text(response).await.contains("link.md"));
    assert_eq!(get(&app, "/").await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/sitemap").await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/link.md").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_console_route_needs_secret() {
    let temp = site();

    let without = app(temp.path(), None);
    assert_eq!(get(&without, "/_ws").await.status(), StatusCode::NOT_FOUND);

    // A plain GET is not an upgrade, but the route exists.
    let with = app(temp.path(), Some("s3cret"));
    assert_ne!(get(&with, "/_ws").await.status(), StatusCode::NOT_FOUND);
}
