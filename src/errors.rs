//! # Error Handling for List APIs
//!
//! Every failure leaving this crate is an [`ApiError`]. Each variant maps to
//! one HTTP status and one stable `name`, and is rendered as the failure
//! envelope:
//!
//! ```json
//! {"success": false, "error": {"name": "ValidationError", "message": "...", "issues": [...]}}
//! ```
//!
//! Database errors are logged server-side with `tracing` and never sent to
//! clients; the client only sees a generic message.
//!
//! ```rust,ignore
//! use querycrate::ApiError;
//!
//! async fn my_handler() -> Result<Json<MyData>, ApiError> {
//!     let data = MyEntity::find_by_id(id)
//!         .one(db)
//!         .await?
//!         .ok_or_else(|| ApiError::not_found("Attendance record", Some(id.to_string())))?;
//!     Ok(Json(data))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use std::fmt;

use crate::response::{ErrorBody, ErrorEnvelope};
use crate::validation::{ValidationIssue, ValidationIssues};

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - malformed or contradictory input
    Validation {
        /// Every issue found in the request
        issues: Vec<ValidationIssue>,
    },

    /// 409 Conflict - uniqueness violation detected before insert
    Duplicate {
        /// User-facing error message
        message: String,
        /// Id of the record that already exists, when known
        existing_id: Option<String>,
    },

    /// 404 Not Found - resource id absent
    NotFound {
        /// Resource type (e.g., "Employee", "Attendance record")
        resource: String,
        /// Optional ID that wasn't found
        id: Option<String>,
    },

    /// 401 Unauthorized - no authenticated principal
    Unauthorized {
        /// User-facing error message
        message: String,
    },

    /// 403 Forbidden - principal lacks the required role
    Forbidden {
        /// User-facing error message
        message: String,
    },

    /// 500 Internal Server Error - storage failure (details logged, not exposed)
    Storage {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 500 Internal Server Error - anything else
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },
}

impl ApiError {
    /// Create a 400 error from a list of issues
    #[must_use]
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        Self::Validation { issues }
    }

    /// Create a 400 error from a single issue
    #[must_use]
    pub fn invalid(issue: ValidationIssue) -> Self {
        Self::Validation {
            issues: vec![issue],
        }
    }

    /// Create a 409 Conflict error
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::duplicate(
    ///     "Attendance record already exists for this user on this date",
    ///     Some(existing.id),
    /// ));
    /// ```
    pub fn duplicate(message: impl Into<String>, existing_id: Option<String>) -> Self {
        Self::Duplicate {
            message: message.into(),
            existing_id,
        }
    }

    /// Create a 404 Not Found error
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    /// Create a 401 Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a 403 Forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a 500 error from a database error
    ///
    /// The database error details are logged but NOT sent to the user.
    #[must_use]
    pub fn storage(err: DbErr) -> Self {
        Self::Storage {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Create a 500 Internal Server Error with optional details
    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Stable error name carried in the envelope
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::Duplicate { .. } => "DuplicateError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Unauthorized { .. } => "UnauthorizedError",
            Self::Forbidden { .. } => "ForbiddenError",
            Self::Storage { .. } => "StorageError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Duplicate { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Storage { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { issues } => match issues.as_slice() {
                [single] => single.to_string(),
                many => format!(
                    "Validation failed: {}",
                    many.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::Duplicate { message, .. }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::Storage { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Storage { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    name = self.name(),
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }

    /// Failure envelope body for this error
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            name: self.name().to_string(),
            message: self.user_message(),
            issues: None,
            existing_id: None,
        };
        match self {
            Self::Validation { issues } => body.issues = Some(issues.clone()),
            Self::Duplicate { existing_id, .. } => body.existing_id.clone_from(existing_id),
            _ => {}
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let envelope = ErrorEnvelope {
            success: false,
            error: self.to_body(),
        };

        (self.status_code(), Json(envelope)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationIssues> for ApiError {
    fn from(issues: ValidationIssues) -> Self {
        Self::Validation {
            issues: issues.into_issues(),
        }
    }
}

impl From<ValidationIssue> for ApiError {
    fn from(issue: ValidationIssue) -> Self {
        Self::invalid(issue)
    }
}

/// Convert `SeaORM` `DbErr` to `ApiError`
///
/// - `DbErr::RecordNotFound` becomes 404
/// - unique constraint violations become 409 without an `existingId`
/// - everything else becomes a 500 `StorageError`
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(msg) = &err {
            let resource = msg.split_whitespace().next().unwrap_or("Resource");
            return Self::NotFound {
                resource: resource.to_string(),
                id: None,
            };
        }
        if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
            tracing::debug!(error = ?err, "Unique constraint violation");
            return Self::Duplicate {
                message: "Resource already exists".to_string(),
                existing_id: None,
            };
        }
        Self::storage(err)
    }
}
