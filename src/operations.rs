//! # List Query Execution
//!
//! A [`ListQuery`] turns a validated [`QuerySpec`] and a resource's
//! [`ResourceQueryConfig`] into a [`ListPlan`]: one data statement and one
//! count statement derived from the same filtered base select, so every join
//! and predicate fragment of the page is also applied to the total.
//!
//! ```rust,ignore
//! let spec = QuerySpec::from_query_str("page=2&limit=5&search=jane")?;
//! let page = ListQuery::new(&config, &spec)
//!     .plan(db.get_database_backend())?
//!     .fetch(&db)
//!     .await?;
//! assert_eq!(page.pagination().page, 2);
//! ```
//!
//! Both statements run concurrently. If either fails the other is dropped,
//! and dropping the returned future (for example when the client goes away)
//! drops both; each statement's pooled connection is released when its
//! future completes or is dropped.

use axum::response::{IntoResponse, Response};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, EntityTrait, FromQueryResult, Order, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, Select, Statement,
    sea_query::{ColumnRef, Expr, Func, SimpleExpr},
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::errors::ApiError;
use crate::filtering::conditions::{build_predicate, coerce_operand};
use crate::filtering::pagination::{PaginationMetadata, page_offset};
use crate::filtering::sort::{ResolvedSort, resolve_sort};
use crate::models::QuerySpec;
use crate::resource::ResourceQueryConfig;
use crate::response::ApiResponse;
use crate::validation::ValidationIssue;

/// Alias of the count column
pub const TOTAL_ITEMS_ALIAS: &str = "total_items";

/// A list request against one resource
pub struct ListQuery<'a, E: EntityTrait> {
    config: &'a ResourceQueryConfig<E>,
    spec: &'a QuerySpec,
}

impl<'a, E: EntityTrait> ListQuery<'a, E> {
    pub fn new(config: &'a ResourceQueryConfig<E>, spec: &'a QuerySpec) -> Self {
        Self { config, spec }
    }

    /// Build the predicate and sort for `backend`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for an unknown `sort_by`, an operand
    /// that does not fit its column, or date bounds on a resource without a
    /// date column.
    pub fn plan(&self, backend: DatabaseBackend) -> Result<ListPlan<E>, ApiError> {
        let sort = resolve_sort(self.config, self.spec)?;
        let predicate = build_predicate(self.config, self.spec, backend)?;
        let offset = page_offset(self.spec.page, self.spec.limit);

        tracing::debug!(
            resource = self.config.resource_name(),
            sort_field = %sort.field,
            sort_order = sort.order.as_str(),
            offset,
            limit = self.spec.limit,
            fragments = predicate.fragments(),
            joins = self.config.joins().len(),
            "Built list plan"
        );

        Ok(ListPlan {
            config: self.config.clone(),
            condition: predicate.into_condition(),
            sort,
            page: self.spec.page,
            limit: self.spec.limit,
            offset,
        })
    }
}

/// Data and count statements of one list request
pub struct ListPlan<E: EntityTrait> {
    config: ResourceQueryConfig<E>,
    condition: Option<sea_orm::Condition>,
    sort: ResolvedSort,
    page: u64,
    limit: u64,
    offset: u64,
}

impl<E: EntityTrait> ListPlan<E> {
    #[must_use]
    pub fn sort(&self) -> &ResolvedSort {
        &self.sort
    }

    #[must_use]
    pub fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Joins and combined predicate, shared by data and count
    fn filtered(&self) -> Select<E> {
        let mut select = E::find();
        for join in self.config.joins() {
            select = select.join(join.join_type(), join.relation());
        }
        if let Some(condition) = &self.condition {
            select = select.filter(condition.clone());
        }
        select
    }

    /// With joins, page rows are grouped by primary key so fan-out rows
    /// collapse to one row per entity, matching `COUNT(DISTINCT pk)`
    fn grouped(&self) -> bool {
        !self.config.joins().is_empty()
    }

    /// Column expression of a joined table, aggregated per entity
    fn per_entity(&self, expr: SimpleExpr, order: Order) -> SimpleExpr {
        if !self.grouped() || !is_foreign_column(&expr, E::default().table_name()) {
            return expr;
        }
        match order {
            Order::Desc => Func::max(expr).into(),
            _ => Func::min(expr).into(),
        }
    }

    fn ordered(&self, mut select: Select<E>) -> Select<E> {
        if self.grouped() {
            select = select.group_by(self.config.primary_key().expr());
        }
        for (expr, order) in self.sort.order_by() {
            let expr = self.per_entity(expr, order.clone());
            select = select.order_by(expr, order);
        }
        select.offset(self.offset).limit(self.limit)
    }

    /// Page of entity rows: every entity column, sorted, offset and limited
    #[must_use]
    pub fn data_select(&self) -> Select<E> {
        self.ordered(self.filtered())
    }

    /// Page of rows limited to the configured projection, if any. Projected
    /// columns of joined tables are reduced with `MIN` when joins apply.
    #[must_use]
    pub fn projected_select(&self) -> Select<E> {
        let Some(projection) = self.config.projection() else {
            return self.data_select();
        };
        let mut select = self.filtered().select_only();
        for (alias, expr) in projection {
            let expr = self.per_entity(expr.clone(), Order::Asc);
            select = select.column_as(expr, alias.as_str());
        }
        self.ordered(select)
    }

    /// `COUNT(DISTINCT <primary key>)` over the same joins and predicate
    #[must_use]
    pub fn count_select(&self) -> Select<E> {
        let count = SimpleExpr::from(Func::count_distinct(self.config.primary_key().expr()));
        self.filtered()
            .select_only()
            .column_as(count, TOTAL_ITEMS_ALIAS)
    }

    /// Render the data statement without executing it
    #[must_use]
    pub fn data_statement(&self, backend: DatabaseBackend) -> Statement {
        self.data_select().build(backend)
    }

    /// Render the count statement without executing it
    #[must_use]
    pub fn count_statement(&self, backend: DatabaseBackend) -> Statement {
        self.count_select().build(backend)
    }

    async fn total<C: ConnectionTrait>(&self, db: &C) -> Result<u64, sea_orm::DbErr> {
        let total = self.count_select().into_tuple::<i64>().one(db).await?;
        Ok(total.and_then(|total| u64::try_from(total).ok()).unwrap_or(0))
    }

    /// Run data and count concurrently and return typed models.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` when either statement fails.
    pub async fn fetch<C: ConnectionTrait>(&self, db: &C) -> Result<ListPage<E::Model>, ApiError> {
        let rows = self.data_select().all(db);
        let total = self.total(db);
        let (rows, total_items) = tokio::try_join!(rows, total).map_err(ApiError::storage)?;
        Ok(self.page_of(rows, total_items))
    }

    /// Run data and count concurrently and return JSON rows honoring the
    /// projection.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` when either statement fails.
    pub async fn fetch_json<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> Result<ListPage<JsonValue>, ApiError> {
        let rows = self.projected_select().into_json().all(db);
        let total = self.total(db);
        let (rows, total_items) = tokio::try_join!(rows, total).map_err(ApiError::storage)?;
        Ok(self.page_of(rows, total_items))
    }

    /// Run data and count concurrently, reading rows as `T`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` when either statement fails.
    pub async fn fetch_as<T, C>(&self, db: &C) -> Result<ListPage<T>, ApiError>
    where
        T: FromQueryResult + Send + Sync,
        C: ConnectionTrait,
    {
        let rows = self.projected_select().into_model::<T>().all(db);
        let total = self.total(db);
        let (rows, total_items) = tokio::try_join!(rows, total).map_err(ApiError::storage)?;
        Ok(self.page_of(rows, total_items))
    }

    fn page_of<T>(&self, rows: Vec<T>, total_items: u64) -> ListPage<T> {
        ListPage {
            rows,
            total_items,
            page: self.page,
            limit: self.limit,
        }
    }
}

fn is_foreign_column(expr: &SimpleExpr, own_table: &str) -> bool {
    matches!(
        expr,
        SimpleExpr::Column(ColumnRef::TableColumn(table, _)) if table.to_string() != own_table
    )
}

/// One page of rows plus the total matching count
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub rows: Vec<T>,
    pub total_items: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> ListPage<T> {
    #[must_use]
    pub fn pagination(&self) -> PaginationMetadata {
        PaginationMetadata::new(self.page, self.limit, self.total_items)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListPage<U> {
        ListPage {
            rows: self.rows.into_iter().map(f).collect(),
            total_items: self.total_items,
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn into_envelope(self) -> ApiResponse<Vec<T>> {
        let pagination = self.pagination();
        ApiResponse::list(self.rows, pagination)
    }
}

impl<T: Serialize> IntoResponse for ListPage<T> {
    fn into_response(self) -> Response {
        self.into_envelope().into_response()
    }
}

/// Fetch one row by primary key, honoring the resource's base condition.
///
/// # Errors
///
/// Returns `ApiError::Validation` when `id` does not fit the key column,
/// `ApiError::NotFound` when no row matches and `ApiError::Storage` on
/// database failure.
pub async fn fetch_one<E, C>(
    config: &ResourceQueryConfig<E>,
    id: &str,
    db: &C,
) -> Result<E::Model, ApiError>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let primary_key = config.primary_key();
    let value = coerce_operand(primary_key.column_type(), id).ok_or_else(|| {
        ValidationIssue::invalid_type(&["id"], format!("'{id}' is not a valid identifier"))
    })?;

    let mut select = E::find();
    for join in config.joins() {
        select = select.join(join.join_type(), join.relation());
    }
    select = select.filter(Expr::expr(primary_key.expr()).eq(value));
    if let Some(base) = config.base_condition() {
        select = select.filter(base.clone());
    }

    select
        .one(db)
        .await
        .map_err(ApiError::storage)?
        .ok_or_else(|| ApiError::not_found(config.resource_name(), Some(id.to_string())))
}
