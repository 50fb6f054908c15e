//! HTTP server for the cas object store.
//!
//! Uploads are addressed by the SHA-256 of their bytes (`/objects/{id}`) and
//! may also be bound to a `bucket/key` name (`/{bucket}/{key}`).

pub mod conditional;
pub mod config;
pub mod error;
pub mod handler;
pub mod range;
pub mod router;
pub mod server;

pub use config::{parse_listen_addr, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::CasServer;
