//! HTTP surface and admin console for crew.
//!
//! - `GET /…`: resolve, authorize and render a node (`?raw=1` for its bytes)
//! - `POST`/`PUT /…`: script nodes only, status and body passed through
//! - `GET /sitemap`: the site map page
//! - `GET /_static/…`: files under `<root>/_static`
//! - `GET /_ws`: admin console over WebSocket, when a secret is configured

mod config;
pub mod console;
mod error;
pub mod handlers;
mod router;
mod state;

use tokio::net::TcpListener;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use console::{AdminConsole, Command, ConsoleError, ConsoleTransport, Reply, SessionState};
pub use error::ServerError;
pub use router::build_router;
pub use state::AppState;

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("server stopped");
    Ok(())
}
