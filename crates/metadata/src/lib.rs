//! Metadata store abstraction and implementations for Amphora.
//!
//! This crate provides the control-plane data model:
//! - Package rows, their files, dependencies, and npm metadata
//! - Dist-tag pointers
//! - Cached registry metadata documents
//! - Named exclusive leases with automatic expiry
//!
//! All mutations that must be atomic are purpose-built store methods running
//! in a single transaction; callers never compose transactions themselves.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};
