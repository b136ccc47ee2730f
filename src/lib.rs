//! Workspace umbrella crate.
//!
//! Re-exports the catalog sync façade so hosts can depend on a single crate
//! and opt into the desktop adapters through the `desktop-shims` feature.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
