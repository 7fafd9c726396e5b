//! Generic list and get-by-id handlers for any configured resource.
//!
//! ```rust,ignore
//! let employees = ResourceState::new(db.clone(), employee_config);
//! let app = Router::new().nest("/employees", resource_router(employees));
//! // GET /employees?search=jane&sort_by=name&sort_order=asc
//! // GET /employees/emp_1
//! ```

use axum::{
    Router,
    extract::{Path, RawQuery, State},
    routing::get,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::models::{QueryDefaults, QuerySpec};
use crate::operations::{ListPage, ListQuery, fetch_one};
use crate::resource::ResourceQueryConfig;
use crate::response::ApiResponse;

/// Shared state of one resource's routes
pub struct ResourceState<E: EntityTrait> {
    pub db: DatabaseConnection,
    pub config: Arc<ResourceQueryConfig<E>>,
    pub defaults: QueryDefaults,
}

impl<E: EntityTrait> ResourceState<E> {
    pub fn new(db: DatabaseConnection, config: ResourceQueryConfig<E>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            defaults: QueryDefaults::default(),
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: QueryDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

impl<E: EntityTrait> Clone for ResourceState<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            config: Arc::clone(&self.config),
            defaults: self.defaults,
        }
    }
}

/// Parse, plan and execute a list request, returning JSON rows
///
/// # Errors
///
/// `ValidationError` (400) for bad parameters, `StorageError` (500) when a
/// statement fails.
pub async fn list_resource<E>(
    State(state): State<ResourceState<E>>,
    RawQuery(query): RawQuery,
) -> Result<ListPage<JsonValue>, ApiError>
where
    E: EntityTrait,
{
    let query = query.as_deref().unwrap_or_default();
    let spec = QuerySpec::from_query_str_with(query, &state.defaults)?;
    ListQuery::new(&*state.config, &spec)
        .plan(state.db.get_database_backend())?
        .fetch_json(&state.db)
        .await
}

/// Fetch one row by primary key
///
/// # Errors
///
/// `NotFoundError` (404) when absent, `ValidationError` (400) when the id
/// does not fit the key column.
pub async fn get_resource<E>(
    State(state): State<ResourceState<E>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<E::Model>, ApiError>
where
    E: EntityTrait,
    E::Model: Serialize,
{
    let model = fetch_one(&*state.config, &id, &state.db).await?;
    Ok(ApiResponse::item(model))
}

/// `GET /` lists, `GET /{id}` fetches one. Nest under the resource path.
pub fn resource_router<E, S>(state: ResourceState<E>) -> Router<S>
where
    E: EntityTrait,
    E::Model: Serialize,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list_resource::<E>))
        .route("/{id}", get(get_resource::<E>))
        .with_state(state)
}
