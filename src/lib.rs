//! # querycrate
//!
//! Filtering, search, date bounding, sorting and offset pagination for list
//! endpoints built on Axum and Sea-ORM.
//!
//! A resource is described once with a [`ResourceQueryConfig`]. Each request
//! is parsed into a [`QuerySpec`], planned with [`ListQuery`] into a data and
//! a count statement that share every join and predicate, executed
//! concurrently, and returned in the uniform [`ApiResponse`] envelope.
//!
//! ```rust,ignore
//! use querycrate::{ListQuery, QuerySpec, ResourceQueryConfig, SortOrder};
//!
//! let config = ResourceQueryConfig::<attendance::Entity>::builder("attendance")
//!     .searchable([attendance::Column::Id, attendance::Column::UserId])
//!     .default_sort(attendance::Column::Date, SortOrder::Desc)
//!     .date_column(attendance::Column::Date)
//!     .build()?;
//!
//! async fn list(spec: QuerySpec, State(db): State<DatabaseConnection>) -> Result<impl IntoResponse, ApiError> {
//!     ListQuery::new(&config, &spec)
//!         .plan(db.get_database_backend())?
//!         .fetch_json(&db)
//!         .await
//! }
//! ```

pub mod auth;
pub mod errors;
pub mod filtering;
pub mod models;
pub mod operations;
pub mod resource;
pub mod response;
pub mod routes;
pub mod validation;

pub use auth::{
    HeaderPrincipalResolver, Principal, PrincipalResolver, Role, require_principal, require_role,
};
pub use errors::ApiError;
pub use filtering::pagination::PaginationMetadata;
pub use models::{FilterOperators, ListParams, NullCheck, QueryDefaults, QuerySpec, SortOrder};
pub use operations::{ListPage, ListPlan, ListQuery, fetch_one};
pub use resource::{ColumnHandle, ConfigError, JoinSpec, ResourceQueryConfig};
pub use response::{ApiResponse, ErrorBody, ErrorEnvelope};
pub use routes::{ResourceState, get_resource, list_resource, resource_router};
pub use validation::{ValidationIssue, ValidationIssues};
