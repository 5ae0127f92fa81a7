//! Global application error types and handlers.
//!
//! This module defines the error type used across the backend and its
//! conversion into JSON HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use procview_adapters::AdapterError;
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::TableError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
    #[error("no table is configured for channel {0}")]
    ChannelNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ChannelNotFound(_) | AppError::Adapter(AdapterError::UnknownChannel(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Table(TableError::AlreadyActive(_) | TableError::Superseded(_)) => {
                StatusCode::CONFLICT
            }
            AppError::Table(TableError::Subscribe { .. }) | AppError::Adapter(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(_) | AppError::Template(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(event = "api.request_failed", error = %self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
