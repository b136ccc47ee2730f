//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the catalog sync crates:
//! - Logging and tracing bootstrap
//! - Sync settings and the bridge-bundling `CoreConfig`
//! - Event bus for sync, webhook and catalog events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
