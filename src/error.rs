//! Error types for LunaTrack.
//!
//! Library code returns these typed errors; only the binary collapses them into
//! `anyhow`. [`ApiError`] is the single type handlers return, and it renders as
//! `{ "error": "<message>" }` with a matching status code.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures of calendar-date parsing and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    /// The string is not a real `YYYY-MM-DD` Gregorian date.
    #[error("invalid date format: {0:?} (expected YYYY-MM-DD)")]
    InvalidDateFormat(String),

    #[error("date {date} shifted by {days} days is out of the supported range")]
    OutOfRange { date: String, days: i64 },
}

/// A settings record that cannot be stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("defaultCycleLength must be between {min} and {max} days, got {value}")]
    CycleLengthOutOfRange { value: u32, min: u32, max: u32 },

    #[error("dataFile must be a plain file name, got {0:?}")]
    InvalidDataFile(String),

    #[error("{0} must be a non-zero port number")]
    InvalidPort(&'static str),

    #[error("SSL.{0} must be a non-empty path")]
    InvalidSsl(&'static str),
}

/// Errors from the JSON file storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// `settings.json` parsed but breaks an invariant.
    #[error("invalid settings in {path}: {source}")]
    InvalidStoredSettings {
        path: String,
        #[source]
        source: SettingsError,
    },
}

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<DateError> for ApiError {
    fn from(err: DateError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Malformed or mistyped JSON bodies are client errors, reported like any other.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Settings(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_error_maps_to_bad_request() {
        let err: ApiError = DateError::InvalidDateFormat("nope".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_storage_error_maps_to_internal() {
        let err: ApiError = StorageError::Io {
            path: "data/cycles.json".into(),
            source: std::io::Error::other("disk gone"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_stored_settings_map_to_internal() {
        let err: ApiError = StorageError::InvalidStoredSettings {
            path: "data/settings.json".into(),
            source: SettingsError::InvalidPort("httpPort"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("httpPort"));
    }

    #[test]
    fn test_invalid_settings_map_to_bad_request() {
        let err: ApiError = StorageError::Settings(SettingsError::InvalidPort("httpPort")).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
