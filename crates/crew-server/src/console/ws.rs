//! WebSocket transport for the admin console.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use crew_render::rpc::BoxFuture;

use super::{ConsoleError, ConsoleTransport};
use crate::state::AppState;

/// Console over an upgraded WebSocket. Text and binary frames are both
/// read as text.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl ConsoleTransport for WsTransport {
    fn send<'a>(&'a mut self, message: &'a str) -> BoxFuture<'a, Result<(), ConsoleError>> {
        Box::pin(async move {
            self.socket
                .send(Message::Text(message.to_string()))
                .await
                .map_err(ConsoleError::transport)
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, ConsoleError>> {
        Box::pin(async move {
            loop {
                match self.socket.recv().await {
                    None | Some(Ok(Message::Close(_))) => return Ok(None),
                    Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                    Some(Ok(Message::Binary(bytes))) => {
                        return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                    }
                    // Ping/pong are answered by the socket itself.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(ConsoleError::transport(e)),
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ConsoleError>> {
        Box::pin(async move {
            // The peer may already be gone.
            let _ = self.socket.send(Message::Close(None)).await;
            Ok(())
        })
    }
}

/// `GET /_ws`: upgrade into a console session.
pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(console) = state.console().cloned() else {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| async move {
        tracing::info!("console connected");
        let mut transport = WsTransport::new(socket);
        match console.run(&mut transport).await {
            Ok(()) => tracing::info!("console closed"),
            Err(e) => tracing::warn!(error = %e, "console session aborted"),
        }
    })
}
