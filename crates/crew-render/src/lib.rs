//! Rendering for crew.
//!
//! [`RenderDispatcher`] maps a node's content type onto a body strategy:
//!
//! | Content type | Body |
//! |---|---|
//! | `Static` | markdown converted, HTML and other files passed through; directories delegate to their index or get a listing |
//! | `KeyValue` | value stored under the routing key; a failed lookup becomes `error: …` |
//! | `RemoteProcedure` | JSON-RPC `Render(url, params)` result |
//! | `Script` | `(status, body)` from a sandboxed Lua script; non-200 fails the page |
//!
//! The body is then composed with the navigation fragment into a
//! [`PageTemplate`].

mod dispatch;
mod error;
pub mod markup;
pub mod nav;
mod page;
pub mod rpc;
pub mod store;

pub use dispatch::{RenderDispatcher, Rendered, RequestContext};
pub use error::RenderError;
pub use page::{BodySource, DEFAULT_TEMPLATE, Page, PageTemplate, SiteInfo};
pub use rpc::{JsonRpcRenderer, RemoteRender, RpcError};
pub use store::{KvStore, MemoryStore, SledStore, StoreError};
