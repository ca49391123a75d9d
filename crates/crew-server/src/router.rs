//! Route table.

use axum::Router;
use axum::routing::get;

use crate::console::ws;
use crate::handlers;
use crate::state::AppState;

/// Build the application router.
///
/// `/sitemap` and `/_static/*path` are fixed routes; everything else falls
/// through to node resolution. `/_ws` exists only when the console is
/// enabled.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/sitemap", get(handlers::sitemap))
        .route("/_static/*path", get(handlers::static_file));

    if state.console().is_some() {
        router = router.route("/_ws", get(ws::upgrade));
    }

    router.fallback(handlers::node).with_state(state)
}
