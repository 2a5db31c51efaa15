//! Student record types and their persisted/wire mappings

use rusqlite::Row;

/// URL prefix under which cached images are served
pub const CACHE_ROUTE_PREFIX: &str = "/cache/";

/// A stored student
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    /// Store-generated identifier, immutable
    pub id: String,
    pub name: String,
    pub age: i64,
    /// Fetch URL of the mirrored image on the origin
    pub remote_image_url: Option<String>,
    /// Cache-relative path, always `/cache/<filename>`
    pub local_image_url: Option<String>,
}

impl StudentRecord {
    /// Map a `students` row (`id, name, age, remote_image_url, local_image_url`)
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            remote_image_url: row.get(3)?,
            local_image_url: row.get(4)?,
        })
    }

    /// File name inside the cache directory, if the record has a cached image
    pub fn cache_filename(&self) -> Option<&str> {
        self.local_image_url
            .as_deref()
            .map(|path| path.strip_prefix(CACHE_ROUTE_PREFIX).unwrap_or(path))
            .filter(|name| !name.is_empty())
    }
}

/// Cache-relative path stored on a record for a cached file
pub fn local_image_url(filename: &str) -> String {
    format!("{}{}", CACHE_ROUTE_PREFIX, filename)
}

/// Fields for a record about to be created
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub age: i64,
}

/// Partial update; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    /// `Some(None)` clears the mirror URL
    pub remote_image_url: Option<Option<String>>,
    pub local_image_url: Option<String>,
}
