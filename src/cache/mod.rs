//! Local image cache and its startup reconciliation with the origin

pub mod file_cache;
pub mod reconcile;

pub use file_cache::{cache_filename, remote_extension, ImageCache};
pub use reconcile::{reconcile, ReconcileReport};
