//! Request handlers for student entries and cached images

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info};

use super::errors::{
    ApiError, MSG_FILE_NOT_FOUND, MSG_INCOMPLETE, MSG_NO_DATA, MSG_STUDENT_NOT_FOUND,
};
use super::protocol::{parse_age, HostUrl, StudentForm, StudentView};
use super::server::AppState;
use crate::cache::cache_filename;
use crate::origin::RemoteOrigin;
use crate::store::{local_image_url, NewStudent, StudentPatch, StudentRecord};

type SharedState = State<Arc<AppState>>;

/// POST /entries
pub async fn create_student(
    State(state): SharedState,
    host: HostUrl,
    form: StudentForm,
) -> Result<(StatusCode, Json<StudentView>), ApiError> {
    let (Some(name), Some(age), Some(image)) = (form.name, form.age, form.image) else {
        return Err(ApiError::Validation(MSG_INCOMPLETE));
    };
    let age = parse_age(&age)?;

    let record = state.store.insert(NewStudent { name, age })?;

    let filename = cache_filename(&record.id, &image.filename);
    state.cache.store(&filename, &image.data)?;
    let remote_image_url = mirror_upload(state.origin.as_ref(), &filename, &image.data).await;
    let local_image_url = local_image_url(&filename);

    let patch = StudentPatch {
        remote_image_url: Some(remote_image_url.clone()),
        local_image_url: Some(local_image_url.clone()),
        ..Default::default()
    };
    state.store.update(&record.id, &patch)?;

    info!(id = %record.id, file = %filename, mirrored = remote_image_url.is_some(), "Student created");

    let record = StudentRecord {
        remote_image_url,
        local_image_url: Some(local_image_url),
        ..record
    };
    Ok((StatusCode::CREATED, Json(StudentView::resolve(record, &host))))
}

/// GET /entries
pub async fn list_students(
    State(state): SharedState,
    host: HostUrl,
) -> Result<Json<Vec<StudentView>>, ApiError> {
    let students = state
        .store
        .list()?
        .into_iter()
        .map(|record| StudentView::resolve(record, &host))
        .collect();
    Ok(Json(students))
}

/// GET /entries/{id}
pub async fn get_student(
    State(state): SharedState,
    Path(id): Path<String>,
    host: HostUrl,
) -> Result<Json<StudentView>, ApiError> {
    let record = find_student(&state, &id)?;
    Ok(Json(StudentView::resolve(record, &host)))
}

/// PUT /entries/{id}
pub async fn update_student(
    State(state): SharedState,
    Path(id): Path<String>,
    host: HostUrl,
    form: StudentForm,
) -> Result<Json<StudentView>, ApiError> {
    let age = form.parsed_age()?;
    if form.name.is_none() && age.is_none() && form.image.is_none() {
        return Err(ApiError::Validation(MSG_NO_DATA));
    }

    let existing = find_student(&state, &id)?;

    let mut patch = StudentPatch {
        name: form.name,
        age,
        ..Default::default()
    };

    if let Some(image) = form.image {
        let filename = cache_filename(&id, &image.filename);
        state.cache.store(&filename, &image.data)?;

        // A new extension leaves the old file orphaned
        if let Some(previous) = existing.cache_filename().filter(|f| *f != filename) {
            state.cache.remove(previous)?;
        }

        // A failed upload clears the previous mirror URL
        patch.local_image_url = Some(local_image_url(&filename));
        patch.remote_image_url =
            Some(mirror_upload(state.origin.as_ref(), &filename, &image.data).await);
    }

    if !state.store.update(&id, &patch)? {
        return Err(ApiError::NotFound(MSG_STUDENT_NOT_FOUND));
    }

    info!(id = %id, image = patch.local_image_url.is_some(), "Student updated");

    let record = find_student(&state, &id)?;
    Ok(Json(StudentView::resolve(record, &host)))
}

/// DELETE /entries/{id}
pub async fn delete_student(
    State(state): SharedState,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = find_student(&state, &id)?;

    if let Some(filename) = record.cache_filename() {
        state.cache.remove(filename)?;
    }
    state.store.delete(&id)?;

    info!(id = %id, "Student removed");
    Ok(Json(json!({ "message": "student removed" })))
}

/// GET /cache/{filename}
pub async fn serve_image(
    State(state): SharedState,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state
        .cache
        .path_for(&filename)
        .ok_or(ApiError::NotFound(MSG_FILE_NOT_FOUND))?;

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ApiError::NotFound(MSG_FILE_NOT_FOUND));
    }

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let _content_type = HeaderValue::from_str(mime.essence_str())
        .context("Invalid content type for cached file")?;

    let response = match ServeFile::new_with_mime(&path, &mime)
        .oneshot(request)
        .await
    {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.into_response())
}

/// GET /health
pub async fn health(State(state): SharedState) -> Result<Json<Value>, ApiError> {
    let records = state.store.count().context("Failed to count records")?;
    let origin = state.origin.status();
    let status = if origin.health == "healthy" {
        "healthy"
    } else {
        "degraded"
    };
    Ok(Json(json!({
        "status": status,
        "records": records,
        "origin": origin,
    })))
}

fn find_student(state: &AppState, id: &str) -> Result<StudentRecord, ApiError> {
    state
        .store
        .get(id)?
        .ok_or(ApiError::NotFound(MSG_STUDENT_NOT_FOUND))
}

/// Best-effort mirror to the origin; the local copy is authoritative either way
///
/// The origin client logs and records the failure itself.
async fn mirror_upload(origin: &dyn RemoteOrigin, filename: &str, data: &[u8]) -> Option<String> {
    match origin.upload(filename, data).await {
        Ok(receipt) => receipt.download_url,
        Err(e) => {
            debug!(
                file = filename,
                kind = e.kind(),
                error = %e,
                "Image cached locally but not mirrored to origin"
            );
            None
        }
    }
}
