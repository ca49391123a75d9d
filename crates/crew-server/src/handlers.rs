//! HTTP handlers.

use std::collections::HashMap;
use std::path::{Component, Path};

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use crew_core::{AccessGuard, Credentials, Node, TreeError};
use crew_render::{Rendered, RequestContext};
use serde_json::Value;

use crate::error::ServerError;
use crate::state::AppState;

/// Directory under the content root served verbatim.
pub const STATIC_DIR: &str = "_static";

/// Fallback: resolve the path to a node, authorize, render.
pub async fn node(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServerError> {
    let path = uri.path();
    tracing::debug!(%method, path, "request");

    let credentials = Credentials::from_authorization(
        headers
            .get_all(header::AUTHORIZATION)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    );
    let tree = state.dispatcher().shared_tree();
    let url = path.to_string();
    let node = tokio::task::spawn_blocking(move || -> Result<Node, ServerError> {
        let node = tree.resolve_url(&url)?;
        AccessGuard::new(&tree).authorize(&node, &credentials)?;
        Ok(node)
    })
    .await??;

    let mut ctx = RequestContext::new(method.as_str(), path)
        .with_headers(header_map(&headers))
        .with_query(parse_query(uri.query()));
    if method == Method::POST || method == Method::PUT {
        ctx = ctx.with_body_params(parse_body(&headers, &body)?);
    }

    let response = match state.dispatcher().dispatch(&node, &ctx).await? {
        Rendered::Page(html) => Html(html).into_response(),
        Rendered::Raw(bytes) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Rendered::Script(resp) => {
            let status =
                StatusCode::from_u16(resp.status).map_err(|_| ServerError::InvalidStatus(resp.status))?;
            (status, Html(resp.body)).into_response()
        }
    };
    tracing::info!(%method, path, status = response.status().as_u16(), "served");
    Ok(response)
}

/// `GET /sitemap`.
pub async fn sitemap(State(state): State<AppState>, uri: Uri) -> Result<Response, ServerError> {
    let ctx = RequestContext::get(uri.path()).with_query(parse_query(uri.query()));
    let html = state.dispatcher().render_sitemap(&ctx).await?;
    Ok(Html(html).into_response())
}

/// `GET /_static/*path`: a literal file under `<root>/_static`.
pub async fn static_file(
    State(state): State<AppState>,
    UrlPath(rel): UrlPath<String>,
) -> Result<Response, ServerError> {
    let base = state.tree().root_path().join(STATIC_DIR);
    let not_found = || ServerError::Tree(TreeError::NotFound { path: base.join(&rel) });

    let confined = Path::new(&rel)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if rel.is_empty() || !confined {
        return Err(not_found());
    }

    let path = base.join(&rel);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| TreeError::io(&path, e))?;
    if metadata.is_dir() {
        return Err(not_found());
    }
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| TreeError::io(&path, e))?;

    let content_type = HeaderValue::from_static(content_type_for(&path));
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" | "md" => "text/plain; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/vnd.microsoft.icon",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Query string as a map; the first occurrence of a key wins.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(query) = query {
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
        }
    }
    params
}

/// Decode a JSON object or form-encoded body. Other bodies carry no
/// parameters.
pub fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<HashMap<String, String>, ServerError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if body.is_empty() {
        return Ok(HashMap::new());
    }
    if content_type.starts_with("application/json") {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(ServerError::BadRequest("JSON body must be an object".into()));
        };
        Ok(object
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect())
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Ok(url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect())
    } else {
        Ok(HashMap::new())
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_first_value_wins() {
        let params = parse_query(Some("a=1&b=two%20words&a=2"));
        assert_eq!(params["a"], "1");
        assert_eq!(params["b"], "two words");
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_json_body_stringified() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let params = parse_body(&headers, br#"{"name": "ada", "age": 36, "ok": true}"#).unwrap();
        assert_eq!(params["name"], "ada");
        assert_eq!(params["age"], "36");
        assert_eq!(params["ok"], "true");

        assert!(matches!(
            parse_body(&headers, b"[1, 2]").unwrap_err(),
            ServerError::BadRequest(_)
        ));
    }

    #[test]
    fn test_form_body() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        let params = parse_body(&headers, b"msg=hello+there&id=7").unwrap();
        assert_eq!(params["msg"], "hello there");
        assert_eq!(params["id"], "7");
    }

    #[test]
    fn test_other_bodies_ignored() {
        let headers = HeaderMap::new();
        assert!(parse_body(&headers, b"whatever").unwrap().is_empty());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a/style.CSS")), "text/css; charset=utf-8");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }
}
