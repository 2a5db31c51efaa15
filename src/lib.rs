//! Student records API
//!
//! Records live in a SQLite store, their photos in a local cache directory
//! that is mirrored to a GitHub repository and refilled from it at startup.

pub mod api;
pub mod cache;
pub mod config;
pub mod origin;
pub mod store;
