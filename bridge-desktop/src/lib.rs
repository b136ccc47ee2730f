//! # Desktop Bridge Implementations
//!
//! Native implementations of the bridge traits for server and desktop hosts.
//!
//! - `HttpClient` using `reqwest`, with retry and exponential backoff
//! - `ConnectionDirectory` backed by a SQLite `connections` table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteConnectionDirectory};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let connections = SqliteConnectionDirectory::new(pool.clone()).await?;
//! ```

mod connections;
mod http;

pub use connections::{ConnectionRecord, SqliteConnectionDirectory};
pub use http::ReqwestHttpClient;
