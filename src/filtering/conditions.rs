use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::{
    ColumnType, Condition, DatabaseBackend, EntityTrait, Value,
    sea_query::{ConditionExpression, Expr, Func, SimpleExpr},
};
use uuid::Uuid;

use super::date_range::{build_date_range_condition, start_of_day};
use super::query_parser::parse_date;
use super::search::{build_search_condition, text_expr};
use crate::errors::ApiError;
use crate::models::{FilterOperators, NullCheck, QuerySpec};
use crate::resource::{ColumnHandle, ResourceQueryConfig};
use crate::validation::{ValidationIssue, ValidationIssues};

/// The AND of every predicate fragment of one request
#[derive(Debug, Clone)]
pub struct CombinedPredicate {
    condition: Condition,
    fragments: usize,
}

impl CombinedPredicate {
    fn new() -> Self {
        Self {
            condition: Condition::all(),
            fragments: 0,
        }
    }

    fn push(&mut self, fragment: impl Into<ConditionExpression>) {
        let condition = std::mem::replace(&mut self.condition, Condition::all());
        self.condition = condition.add(fragment);
        self.fragments += 1;
    }

    #[must_use]
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// `None` when there is nothing to filter on
    #[must_use]
    pub fn into_condition(self) -> Option<Condition> {
        (self.fragments > 0).then_some(self.condition)
    }
}

/// Combine base condition, search, date range and column filters.
///
/// # Errors
///
/// Returns `ApiError::Validation` when an operand cannot be coerced to its
/// column type or date bounds are given for a resource without a date
/// column.
pub fn build_predicate<E: EntityTrait>(
    config: &ResourceQueryConfig<E>,
    spec: &QuerySpec,
    backend: DatabaseBackend,
) -> Result<CombinedPredicate, ApiError> {
    let mut predicate = CombinedPredicate::new();
    let mut issues = ValidationIssues::new();

    if let Some(base) = config.base_condition() {
        predicate.push(base.clone());
    }

    if let Some(search) = build_search_condition(&spec.search, config.searchable(), backend) {
        predicate.push(search);
    }

    if spec.from_date.is_some() || spec.to_date.is_some() {
        match config.date_column() {
            Some(column) => {
                if let Some(range) = build_date_range_condition(
                    column,
                    spec.from_date,
                    spec.to_date,
                    config.timezone(),
                ) {
                    predicate.push(range);
                }
            }
            None => issues.add(ValidationIssue::new(
                "unsupported",
                &["from_date"],
                format!(
                    "'{}' does not support date range filtering",
                    config.resource_name()
                ),
            )),
        }
    }

    for (field, operators) in &spec.filter {
        let Some(column) = config.field(field) else {
            tracing::debug!(
                resource = config.resource_name(),
                field = %field,
                "Ignoring filter on unknown field"
            );
            continue;
        };
        for fragment in build_field_conditions(field, column, operators, backend, &mut issues) {
            predicate.push(fragment);
        }
    }

    issues.result()?;
    Ok(predicate)
}

/// One fragment per present operator of `operators`
fn build_field_conditions(
    field: &str,
    column: &ColumnHandle,
    operators: &FilterOperators,
    backend: DatabaseBackend,
    issues: &mut ValidationIssues,
) -> Vec<SimpleExpr> {
    let mut fragments = Vec::new();
    let col = || Expr::expr(column.expr());

    let scalar = [
        ("eq", &operators.eq),
        ("ne", &operators.ne),
        ("lt", &operators.lt),
        ("lte", &operators.lte),
        ("gt", &operators.gt),
        ("gte", &operators.gte),
    ];
    for (op, raw) in scalar {
        let Some(raw) = raw else { continue };
        let Some(value) = coerce_or_report(field, op, column, raw, issues) else {
            continue;
        };
        fragments.push(match op {
            "eq" => col().eq(value),
            "ne" => col().ne(value),
            "lt" => col().lt(value),
            "lte" => col().lte(value),
            "gt" => col().gt(value),
            _ => col().gte(value),
        });
    }

    if let Some(pattern) = &operators.like {
        fragments.push(Expr::expr(text_expr(column, backend)).like(pattern.as_str()));
    }
    if let Some(pattern) = &operators.ilike {
        fragments.push(
            Expr::expr(Func::lower(text_expr(column, backend))).like(pattern.to_lowercase()),
        );
    }

    for (op, values, negate) in [
        ("in", &operators.r#in, false),
        ("nin", &operators.nin, true),
    ] {
        // An empty list restricts nothing
        let Some(values) = values.as_ref().filter(|values| !values.is_empty()) else {
            continue;
        };
        let coerced: Vec<Value> = values
            .iter()
            .filter_map(|raw| coerce_or_report(field, op, column, raw, issues))
            .collect();
        if coerced.len() != values.len() {
            continue;
        }
        fragments.push(if negate {
            col().is_not_in(coerced)
        } else {
            col().is_in(coerced)
        });
    }

    match operators.is {
        Some(NullCheck::Null) => fragments.push(col().is_null()),
        Some(NullCheck::NotNull) => fragments.push(col().is_not_null()),
        None => {}
    }

    fragments
}

fn coerce_or_report(
    field: &str,
    op: &str,
    column: &ColumnHandle,
    raw: &str,
    issues: &mut ValidationIssues,
) -> Option<Value> {
    let value = coerce_operand(column.column_type(), raw);
    if value.is_none() {
        issues.add(ValidationIssue::invalid_type(
            &["filter", field, op],
            format!("'{raw}' is not a valid {}", type_label(column.column_type())),
        ));
    }
    value
}

/// Convert a raw operand into a value of the column's type
#[must_use]
pub fn coerce_operand(column_type: &ColumnType, raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    match column_type {
        ColumnType::TinyInteger
        | ColumnType::SmallInteger
        | ColumnType::Integer
        | ColumnType::BigInteger
        | ColumnType::TinyUnsigned
        | ColumnType::SmallUnsigned
        | ColumnType::Unsigned
        | ColumnType::BigUnsigned => trimmed.parse::<i64>().ok().map(Value::from),
        ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) | ColumnType::Money(_) => {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::from)
        }
        ColumnType::Boolean => parse_bool(trimmed).map(Value::from),
        ColumnType::Uuid => Uuid::parse_str(trimmed).ok().map(Value::from),
        ColumnType::Date => parse_date(trimmed).map(Value::from),
        ColumnType::DateTime | ColumnType::Timestamp => parse_naive_datetime(trimmed).map(Value::from),
        ColumnType::TimestampWithTimeZone => parse_utc_datetime(trimmed).map(Value::from),
        _ => Some(Value::from(raw.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(value).map(start_of_day))
}

fn parse_utc_datetime(value: &str) -> Option<DateTime<Utc>> {
    parse_naive_datetime(value).map(|naive| naive.and_utc())
}

fn type_label(column_type: &ColumnType) -> &'static str {
    match column_type {
        ColumnType::TinyInteger
        | ColumnType::SmallInteger
        | ColumnType::Integer
        | ColumnType::BigInteger
        | ColumnType::TinyUnsigned
        | ColumnType::SmallUnsigned
        | ColumnType::Unsigned
        | ColumnType::BigUnsigned => "integer",
        ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) | ColumnType::Money(_) => {
            "number"
        }
        ColumnType::Boolean => "boolean",
        ColumnType::Uuid => "uuid",
        ColumnType::Date => "date",
        ColumnType::DateTime | ColumnType::Timestamp | ColumnType::TimestampWithTimeZone => {
            "timestamp"
        }
        _ => "value",
    }
}
