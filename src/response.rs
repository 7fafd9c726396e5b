//! Uniform response envelope
//!
//! Success: `{"success": true, "data": ..., "pagination": {...}}` where
//! `pagination` only appears on list responses.
//! Failure: `{"success": false, "error": {"name": ..., "message": ...}}`,
//! produced by [`ApiError`](crate::ApiError).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::filtering::pagination::PaginationMetadata;
use crate::validation::ValidationIssue;

/// Success envelope
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMetadata>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T> ApiResponse<T> {
    /// Single resource, HTTP 200
    pub fn item(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    /// Newly created resource, HTTP 201
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::item(data)
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// A page of rows together with its metadata, HTTP 200
    pub fn list(rows: Vec<T>, pagination: PaginationMetadata) -> Self {
        Self {
            success: true,
            data: rows,
            pagination: Some(pagination),
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Failure envelope
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

/// Failure details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error kind, e.g. `ValidationError`
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<ValidationIssue>>,
    /// Id of the conflicting record on 409 responses
    #[serde(
        default,
        rename = "existingId",
        skip_serializing_if = "Option::is_none"
    )]
    pub existing_id: Option<String>,
}
