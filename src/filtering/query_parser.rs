//! Query string to [`QuerySpec`].
//!
//! Pagination input is coerced permissively (bad values fall back to
//! defaults) while `sort_order`, dates and filter shapes are validated
//! strictly and rejected with a `ValidationError`. The parser knows nothing about tables; filter field
//! names are only checked against columns by the predicate builder.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::errors::ApiError;
use crate::models::{FilterOperators, NullCheck, QueryDefaults, QuerySpec, SortOrder};
use crate::validation::{ValidationIssue, ValidationIssues};

const FILTER_KEY: &str = "filter";

impl QuerySpec {
    /// Parse a raw (still percent-encoded) query string with default limits.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` listing every invalid parameter.
    pub fn from_query_str(query: &str) -> Result<Self, ApiError> {
        Self::from_query_str_with(query, &QueryDefaults::default())
    }

    /// Parse a raw query string with caller-provided defaults.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` listing every invalid parameter.
    pub fn from_query_str_with(query: &str, defaults: &QueryDefaults) -> Result<Self, ApiError> {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()), defaults)
    }

    /// Parse already-decoded `(key, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` listing every invalid parameter.
    pub fn from_pairs<I, K, V>(pairs: I, defaults: &QueryDefaults) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut spec = Self {
            page: defaults.default_page.max(1),
            limit: defaults.default_limit.max(1),
            ..Self::default()
        };
        let mut issues = ValidationIssues::new();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "page" => {
                    spec.page = parse_positive(value).unwrap_or(defaults.default_page.max(1));
                }
                "limit" => {
                    spec.limit = parse_limit(value, defaults);
                }
                "search" => spec.search = value.trim().to_string(),
                "from_date" => spec.from_date = parse_date_param("from_date", value, &mut issues),
                "to_date" => spec.to_date = parse_date_param("to_date", value, &mut issues),
                "sort_by" => {
                    let field = value.trim();
                    spec.sort_by = (!field.is_empty()).then(|| field.to_string());
                }
                "sort_order" => match SortOrder::parse(value) {
                    Some(order) => spec.sort_order = order,
                    None => issues.add(ValidationIssue::invalid_enum(
                        &["sort_order"],
                        format!("Invalid enum value. Expected 'asc' | 'desc', received '{value}'"),
                    )),
                },
                FILTER_KEY => parse_json_filter(value, &mut spec.filter, &mut issues),
                _ if key.starts_with("filter[") => {
                    parse_bracket_filter(key, value, &mut spec.filter, &mut issues);
                }
                _ => {}
            }
        }

        if let (Some(from), Some(to)) = (spec.from_date, spec.to_date)
            && from > to
        {
            issues.add(ValidationIssue::new(
                "invalid_range",
                &["from_date"],
                format!("from_date ({from}) must not be after to_date ({to})"),
            ));
        }

        issues.result()?;
        Ok(spec)
    }
}

impl<S> FromRequestParts<S> for QuerySpec
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_query_str(parts.uri.query().unwrap_or_default())
    }
}

fn parse_positive(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|v| *v >= 1)
}

fn parse_limit(value: &str, defaults: &QueryDefaults) -> u64 {
    let limit = parse_positive(value).unwrap_or(defaults.default_limit.max(1));
    if defaults.max_limit > 0 && limit > defaults.max_limit {
        tracing::debug!(requested = limit, max = defaults.max_limit, "Clamping list limit");
        return defaults.max_limit;
    }
    limit
}

/// Parse a date bound. Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, RFC 3339 and
/// naive `YYYY-MM-DDTHH:MM:SS[.fff]` timestamps; only the calendar date is
/// kept.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y/%m/%d"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|dt| dt.date())
        })
}

fn parse_date_param(name: &str, value: &str, issues: &mut ValidationIssues) -> Option<NaiveDate> {
    if value.trim().is_empty() {
        return None;
    }
    let parsed = parse_date(value);
    if parsed.is_none() {
        issues.add(ValidationIssue::invalid_date(
            &[name],
            format!("Invalid date '{value}'"),
        ));
    }
    parsed
}

fn parse_json_filter(
    value: &str,
    filter: &mut BTreeMap<String, FilterOperators>,
    issues: &mut ValidationIssues,
) {
    if value.trim().is_empty() {
        return;
    }
    match serde_json::from_str::<BTreeMap<String, FilterOperators>>(value) {
        Ok(parsed) => {
            for (field, operators) in parsed {
                filter.entry(field).or_default().merge(operators);
            }
        }
        Err(e) => issues.add(ValidationIssue::invalid_type(
            &[FILTER_KEY],
            format!("Expected an object of operator sets: {e}"),
        )),
    }
}

/// Split `filter[a][b][]` into `["a", "b", ""]`
fn bracket_segments(key: &str) -> Option<Vec<&str>> {
    let mut rest = key.strip_prefix(FILTER_KEY)?;
    let mut segments = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    Some(segments)
}

fn parse_bracket_filter(
    key: &str,
    value: &str,
    filter: &mut BTreeMap<String, FilterOperators>,
    issues: &mut ValidationIssues,
) {
    let Some(segments) = bracket_segments(key) else {
        issues.add(ValidationIssue::new(
            "invalid_key",
            &[FILTER_KEY],
            format!("Malformed filter key '{key}'"),
        ));
        return;
    };

    let (field, op, index) = match segments.as_slice() {
        [field, op] if !field.is_empty() => (*field, *op, None),
        [field, op, index]
            if !field.is_empty()
                && (index.is_empty() || index.chars().all(|c| c.is_ascii_digit())) =>
        {
            (*field, *op, Some(*index))
        }
        _ => {
            issues.add(ValidationIssue::new(
                "invalid_key",
                &[FILTER_KEY],
                format!("Expected filter[<field>][<operator>], received '{key}'"),
            ));
            return;
        }
    };

    let path = [FILTER_KEY, field, op];
    let operators = filter.entry(field.to_string()).or_default();

    if let Some(slot) = operators.array_slot(op) {
        if index.is_none() {
            issues.add(ValidationIssue::invalid_type(
                &path,
                "Expected array, received string",
            ));
            return;
        }
        slot.get_or_insert_with(Vec::new).push(value.to_string());
    } else if let Some(slot) = operators.scalar_slot(op) {
        if index.is_some() {
            issues.add(ValidationIssue::invalid_type(
                &path,
                "Expected string, received array",
            ));
            return;
        }
        *slot = Some(value.to_string());
    } else if op == "is" {
        if index.is_some() {
            issues.add(ValidationIssue::invalid_type(
                &path,
                "Expected string, received array",
            ));
            return;
        }
        match NullCheck::parse(value) {
            Some(check) => operators.is = Some(check),
            None => issues.add(ValidationIssue::invalid_enum(
                &path,
                format!("Invalid enum value. Expected 'null' | 'notnull', received '{value}'"),
            )),
        }
    } else {
        issues.add(ValidationIssue::unrecognized_key(
            &path,
            format!("Unrecognized filter operator '{op}'"),
        ));
    }
}
