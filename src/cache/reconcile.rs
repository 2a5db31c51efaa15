//! Startup reconciliation
//!
//! One pass over records that carry a remote image URL, pulling any image the
//! local cache is missing. Files already on disk are never re-fetched, so a
//! second run with unchanged records makes no network calls.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::file_cache::{remote_extension, ImageCache};
use crate::origin::RemoteOrigin;
use crate::store::{local_image_url, RecordStore, StudentPatch, StudentRecord};

/// Outcome counts of a reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Images downloaded into the cache
    pub fetched: usize,
    /// Records pointed at a file that was already cached
    pub linked: usize,
    /// Records whose own cached file was already in place
    pub skipped: usize,
    /// Records left unchanged because their image could not be cached
    pub failed: usize,
}

/// What happened to a single record during the pass
enum Outcome {
    Fetched,
    Linked,
    Skipped,
}

/// Populate the cache from the origin for every record missing its file
///
/// A record that cannot be fetched, written or updated is logged and counted
/// as failed; the pass moves on to the next one.
pub async fn reconcile(
    store: &dyn RecordStore,
    origin: &dyn RemoteOrigin,
    cache: &ImageCache,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let records = store.with_remote_image()?;

    info!(candidates = records.len(), "Reconciling image cache with origin");

    for record in records {
        let Some(remote_url) = record.remote_image_url.as_deref() else {
            continue;
        };

        match reconcile_record(store, origin, cache, &record, remote_url).await {
            Ok(Outcome::Fetched) => report.fetched += 1,
            Ok(Outcome::Linked) => report.linked += 1,
            Ok(Outcome::Skipped) => report.skipped += 1,
            Err(e) => {
                warn!(
                    id = %record.id,
                    url = remote_url,
                    error = %format!("{:#}", e),
                    "Failed to cache image from origin"
                );
                report.failed += 1;
            }
        }
    }

    info!(
        fetched = report.fetched,
        linked = report.linked,
        skipped = report.skipped,
        failed = report.failed,
        "Cache reconciliation complete"
    );
    Ok(report)
}

async fn reconcile_record(
    store: &dyn RecordStore,
    origin: &dyn RemoteOrigin,
    cache: &ImageCache,
    record: &StudentRecord,
    remote_url: &str,
) -> Result<Outcome> {
    // An update may have cached the image under a newer extension
    if record.cache_filename().is_some_and(|f| cache.contains(f)) {
        return Ok(Outcome::Skipped);
    }

    let filename = format!("{}{}", record.id, remote_extension(remote_url));
    let patch = StudentPatch {
        local_image_url: Some(local_image_url(&filename)),
        ..Default::default()
    };

    if cache.contains(&filename) {
        store.update(&record.id, &patch)?;
        debug!(id = %record.id, file = %filename, "Linked record to cached image");
        return Ok(Outcome::Linked);
    }

    let bytes = origin
        .fetch(remote_url)
        .await
        .context("Origin fetch failed")?;
    cache.store(&filename, &bytes)?;
    store.update(&record.id, &patch)?;

    info!(id = %record.id, file = %filename, "Cached image from origin");
    Ok(Outcome::Fetched)
}
