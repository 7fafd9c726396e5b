use sea_orm::{EntityTrait, Order, sea_query::SimpleExpr};

use crate::errors::ApiError;
use crate::models::{QuerySpec, SortOrder};
use crate::resource::{ColumnHandle, ResourceQueryConfig};
use crate::validation::ValidationIssue;

/// Where a resolved sort came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortSource {
    Requested,
    ResourceDefault,
    DateColumn,
    PrimaryKey,
}

/// Ordering of one list query: the primary sort plus a primary-key
/// tie-breaker so equal sort values still page deterministically.
#[derive(Debug, Clone)]
pub struct ResolvedSort {
    pub field: String,
    pub order: SortOrder,
    pub source: SortSource,
    column: ColumnHandle,
    tie_breaker: Option<SimpleExpr>,
}

impl ResolvedSort {
    /// Column of the primary sort
    #[must_use]
    pub fn column(&self) -> &ColumnHandle {
        &self.column
    }

    /// `(expression, order)` pairs in application order
    #[must_use]
    pub fn order_by(&self) -> Vec<(SimpleExpr, Order)> {
        let mut order_by = vec![(self.column.expr(), Order::from(self.order))];
        if let Some(tie_breaker) = &self.tie_breaker {
            order_by.push((tie_breaker.clone(), Order::Asc));
        }
        order_by
    }
}

/// Resolve `sort_by`/`sort_order` against the resource.
///
/// Non-empty `sort_by` wins; otherwise the first default sort entry; otherwise
/// the date column, descending; otherwise the primary key, descending.
///
/// # Errors
///
/// Returns `ApiError::Validation` when `sort_by` is not a known field.
pub fn resolve_sort<E: EntityTrait>(
    config: &ResourceQueryConfig<E>,
    spec: &QuerySpec,
) -> Result<ResolvedSort, ApiError> {
    let (field, order, source) = if let Some(requested) = &spec.sort_by {
        if config.field(requested).is_none() {
            let allowed = config.field_names().collect::<Vec<_>>().join("' | '");
            return Err(ValidationIssue::invalid_enum(
                &["sort_by"],
                format!("Invalid enum value. Expected '{allowed}', received '{requested}'"),
            )
            .into());
        }
        (requested.clone(), spec.sort_order, SortSource::Requested)
    } else if let Some((field, order)) = config.default_sort().first() {
        (field.clone(), *order, SortSource::ResourceDefault)
    } else if let Some(field) = config.date_field() {
        (field.to_string(), SortOrder::Desc, SortSource::DateColumn)
    } else {
        (
            config.primary_key().column_name(),
            SortOrder::Desc,
            SortSource::PrimaryKey,
        )
    };

    let primary_key = config.primary_key();
    let column = match source {
        SortSource::PrimaryKey => primary_key,
        _ => config.field(&field).unwrap_or(primary_key),
    };
    let tie_breaker = (column.expr() != primary_key.expr()).then(|| primary_key.expr());

    Ok(ResolvedSort {
        field,
        order,
        source,
        column: column.clone(),
        tie_breaker,
    })
}
