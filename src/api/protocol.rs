//! Wire types for the HTTP API
//!
//! Request forms in, resolved student JSON out. Image references are turned
//! into absolute URLs here, per request, and never stored that way.

use std::collections::HashMap;

use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::request::Parts;
use axum::Form;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::debug;

use super::errors::{ApiError, MSG_BAD_AGE, MSG_BAD_FORM};
use crate::store::StudentRecord;

/// Student as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub age: i64,
    /// Cache-relative image path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_image_url: Option<String>,
    /// `local_image_url` resolved against the serving host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl StudentView {
    /// Map a stored record to its wire form for the requesting host
    pub fn resolve(record: StudentRecord, host: &HostUrl) -> Self {
        let image_url = record
            .local_image_url
            .as_deref()
            .map(|path| host.join(path));
        Self {
            id: record.id,
            name: record.name,
            age: record.age,
            local_image_url: record.local_image_url,
            image_url,
        }
    }
}

/// `scheme://host` of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUrl(pub String);

impl HostUrl {
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0.trim_end_matches('/'), path)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for HostUrl {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let scheme = header("x-forwarded-proto")
            .or_else(|| parts.uri.scheme_str().map(String::from))
            .unwrap_or_else(|| "http".to_string());
        let host = header(HOST.as_str())
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        Ok(HostUrl(format!("{}://{}", scheme, host)))
    }
}

/// Uploaded image file
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Client-supplied file name, used only for its extension
    pub filename: String,
    pub data: Vec<u8>,
}

/// Fields of a create or update request
///
/// Accepts `multipart/form-data` (required for images) or
/// `application/x-www-form-urlencoded`. Empty values count as absent, and an
/// image part without a file name is ignored.
#[derive(Debug, Clone, Default)]
pub struct StudentForm {
    pub name: Option<String>,
    pub age: Option<String>,
    pub image: Option<ImageUpload>,
}

impl StudentForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let field_name = field.name().map(str::to_owned);
            match field_name.as_deref() {
                Some("name") => form.name = non_empty(field.text().await.map_err(bad_form)?),
                Some("age") => form.age = non_empty(field.text().await.map_err(bad_form)?),
                Some("image") => {
                    let filename = field.file_name().unwrap_or_default().to_owned();
                    let data = field.bytes().await.map_err(bad_form)?;
                    if !filename.is_empty() {
                        form.image = Some(ImageUpload {
                            filename,
                            data: data.to_vec(),
                        });
                    }
                }
                other => debug!(field = ?other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            name: fields.remove("name").and_then(non_empty),
            age: fields.remove("age").and_then(non_empty),
            image: None,
        }
    }

    /// Parsed age, if one was supplied
    pub fn parsed_age(&self) -> Result<Option<i64>, ApiError> {
        self.age.as_deref().map(parse_age).transpose()
    }
}

impl<S: Send + Sync> FromRequest<S> for StudentForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(bad_form)?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(bad_form)?;
            Ok(Self::from_fields(fields))
        } else {
            // No form body: every field is absent
            Ok(Self::default())
        }
    }
}

fn bad_form(e: impl std::fmt::Display) -> ApiError {
    debug!(error = %e, "Rejected form body");
    ApiError::Validation(MSG_BAD_FORM)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Parse an integer age, tolerating surrounding whitespace
pub fn parse_age(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::Validation(MSG_BAD_AGE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(local: Option<&str>) -> StudentRecord {
        StudentRecord {
            id: "65a1f0c2".to_string(),
            name: "Ada".to_string(),
            age: 12,
            remote_image_url: Some("https://raw.example.test/up/65a1f0c2.png".to_string()),
            local_image_url: local.map(String::from),
        }
    }

    #[test]
    fn test_resolve_with_local_image() {
        let host = HostUrl("http://localhost:5000".to_string());
        let view = StudentView::resolve(record(Some("/cache/65a1f0c2.png")), &host);
        assert_eq!(
            view.image_url.as_deref(),
            Some("http://localhost:5000/cache/65a1f0c2.png")
        );

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["_id"], "65a1f0c2");
        assert_eq!(json["local_image_url"], "/cache/65a1f0c2.png");
        assert!(json.get("remote_image_url").is_none());
    }

    #[test]
    fn test_resolve_without_local_image() {
        let host = HostUrl("http://localhost:5000/".to_string());
        let view = StudentView::resolve(record(None), &host);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("image_url").is_none());
        assert!(json.get("local_image_url").is_none());
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("12").unwrap(), 12);
        assert_eq!(parse_age(" 7 ").unwrap(), 7);
        assert!(matches!(parse_age("twelve"), Err(ApiError::Validation(MSG_BAD_AGE))));
        assert!(parse_age("12.5").is_err());
    }

    #[test]
    fn test_urlencoded_fields() {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), String::new());
        fields.insert("age".to_string(), "9".to_string());
        let form = StudentForm::from_fields(fields);
        assert!(form.name.is_none());
        assert_eq!(form.parsed_age().unwrap(), Some(9));
        assert!(form.image.is_none());
    }

    #[tokio::test]
    async fn test_host_url_from_headers() {
        let request = axum::http::Request::builder()
            .uri("/entries")
            .header("host", "school.test:8080")
            .header("x-forwarded-proto", "https")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let host = HostUrl::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(host, HostUrl("https://school.test:8080".to_string()));
    }
}
