//! # Vimeo Provider
//!
//! Implements the `CatalogProvider` trait for the Vimeo REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Paged video listing, treating Vimeo's "page out of range" error as the end
//! - Single video lookup and project (folder) listing
//! - Webhook registration with endpoint fallback, and idempotent removal
//! - Caption download with WebVTT to plain text conversion
//!
//! Authentication is a bearer token supplied per call; token refresh is the
//! host's business.

pub mod connector;
pub mod error;
pub mod types;
pub mod webvtt;

pub use connector::{VimeoConnector, VIMEO_API_BASE};
pub use error::{Result, VimeoError};
