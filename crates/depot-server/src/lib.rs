//! HTTP server for Depot.
//!
//! A thin axum layer over the storage engine. Clients first describe a blob
//! (`PUT /v1/blobs`), receive the upload location for its content, then
//! write, append or insert bytes there. Every engine call runs on the
//! blocking pool.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::DepotServer;
pub use state::{route_table, AppState, CONTENT_UPLOAD_ROUTE};
