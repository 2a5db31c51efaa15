//! Record store for student documents

pub mod record;
pub mod sqlite;

use anyhow::Result;

pub use record::{local_image_url, NewStudent, StudentPatch, StudentRecord, CACHE_ROUTE_PREFIX};
pub use sqlite::SqliteStore;

/// Persistence for student records
///
/// Implementations generate ids on insert. `update` and `delete` report
/// whether a record with the id existed.
pub trait RecordStore: Send + Sync {
    fn insert(&self, student: NewStudent) -> Result<StudentRecord>;

    /// All records in creation order
    fn list(&self) -> Result<Vec<StudentRecord>>;

    fn get(&self, id: &str) -> Result<Option<StudentRecord>>;

    fn update(&self, id: &str, patch: &StudentPatch) -> Result<bool>;

    fn delete(&self, id: &str) -> Result<bool>;

    /// Records carrying a remote image URL
    fn with_remote_image(&self) -> Result<Vec<StudentRecord>>;

    fn count(&self) -> Result<usize>;
}
