//!
//! # API Error Handling
//!
//! This module defines the custom error type `ApiError` used throughout the
//! application. Every failure a handler can produce is one of these variants,
//! and each renders as the uniform JSON envelope the API speaks:
//! `{"success": false, "message": ...}`, with a field-keyed `errors` map added
//! for validation failures.
//!
//! `ApiError` implements `actix_web::error::ResponseError`, so handlers return
//! `Result<_, ApiError>` and let `?` do the rest. Server-side detail (database
//! errors) is logged but never leaks into a response body.

use actix_web::{error::ResponseError, HttpResponse};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Field name → list of failure messages, ordered for stable response bodies.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum ApiError {
    /// A malformed or invalid request (HTTP 400).
    BadRequest(String),
    /// Missing or unusable credentials (HTTP 401).
    Unauthorized(String),
    /// Authenticated, but the resource belongs to someone else and the API
    /// admits it exists (HTTP 403). Only the user-profile routes use this;
    /// folders and tasks hide foreign resources behind 404 instead.
    Forbidden(String),
    /// Requested resource absent or not owned by the caller (HTTP 404).
    NotFound(String),
    /// Known path, unsupported verb (HTTP 405).
    MethodNotAllowed,
    /// Input failed schema validation (HTTP 422). Carries per-field messages.
    ValidationFailed(FieldErrors),
    /// An unexpected server-side failure with a client-safe message chosen at
    /// the call site (HTTP 500).
    ServerError(String),
    /// A failure from the persistence layer (HTTP 500). The wrapped detail is
    /// logged; clients only ever see a generic message.
    DatabaseError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::MethodNotAllowed => write!(f, "Method Not Allowed"),
            ApiError::ValidationFailed(errors) => {
                write!(f, "Validation failed for {} field(s)", errors.len())
            }
            ApiError::ServerError(msg) => write!(f, "Server Error: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

fn envelope(message: &str) -> serde_json::Value {
    json!({
        "success": false,
        "message": message,
    })
}

/// Converts `ApiError` variants into `HttpResponse` objects.
///
/// Client errors are logged at warn level, server errors at error level with
/// their full detail.
impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::BadRequest(msg) => {
                log::warn!("API error: {} (status 400)", msg);
                HttpResponse::BadRequest().json(envelope(msg))
            }
            ApiError::Unauthorized(msg) => {
                log::warn!("API error: {} (status 401)", msg);
                HttpResponse::Unauthorized().json(envelope(msg))
            }
            ApiError::Forbidden(msg) => {
                log::warn!("API error: {} (status 403)", msg);
                HttpResponse::Forbidden().json(envelope(msg))
            }
            ApiError::NotFound(msg) => {
                log::warn!("API error: {} (status 404)", msg);
                HttpResponse::NotFound().json(envelope(msg))
            }
            ApiError::MethodNotAllowed => {
                log::warn!("API error: Method Not Allowed (status 405)");
                HttpResponse::MethodNotAllowed().json(envelope("Method Not Allowed"))
            }
            ApiError::ValidationFailed(errors) => {
                log::warn!("API error: validation failed (status 422): {:?}", errors);
                HttpResponse::UnprocessableEntity().json(json!({
                    "success": false,
                    "message": "Validation failed.",
                    "errors": errors,
                }))
            }
            ApiError::ServerError(msg) => {
                log::error!("API error: {} (status 500)", msg);
                HttpResponse::InternalServerError().json(envelope(msg))
            }
            ApiError::DatabaseError(detail) => {
                log::error!("Database error (status 500): {}", detail);
                HttpResponse::InternalServerError()
                    .json(envelope("An unexpected server error occurred."))
            }
        }
    }
}

/// Converts `sqlx::Error` into `ApiError`.
///
/// `sqlx::Error::RowNotFound` maps to `ApiError::NotFound`; everything else
/// becomes `ApiError::DatabaseError` and stays server-side.
impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> ApiError {
        match error {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record not found".into()),
            _ => ApiError::DatabaseError(error.to_string()),
        }
    }
}
