use chrono::NaiveDate;
use sea_orm::Order;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

/// Validated list request: paging, search, date bounds, sort and filters.
///
/// Built by [`QuerySpec::from_query_str`](crate::filtering::query_parser) or
/// extracted directly in an axum handler:
///
/// ```rust,ignore
/// async fn list_employees(spec: QuerySpec, State(state): State<AppState>) -> ... {
///     let page = ListQuery::new(&state.employees, &spec).build(backend)?;
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// 1-based page number
    pub page: u64,
    /// Rows per page, at least 1
    pub limit: u64,
    /// Trimmed free-text search, empty when absent
    pub search: String,
    /// Inclusive lower date bound
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub to_date: Option<NaiveDate>,
    /// Requested sort field; `None` means "use the resource default"
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    /// Operator sets keyed by field name
    pub filter: BTreeMap<String, FilterOperators>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        let defaults = QueryDefaults::default();
        Self {
            page: defaults.default_page,
            limit: defaults.default_limit,
            search: String::new(),
            from_date: None,
            to_date: None,
            sort_by: None,
            sort_order: SortOrder::Desc,
            filter: BTreeMap::new(),
        }
    }
}

/// Sort direction accepted on the wire: exactly `asc` or `desc`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Strict parse: anything but the two lowercase literals is rejected
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// Operand of the `is` operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum NullCheck {
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "notnull")]
    NotNull,
}

impl NullCheck {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "null" => Some(Self::Null),
            "notnull" => Some(Self::NotNull),
            _ => None,
        }
    }
}

/// Operators applied to one field. Present operators are AND-ed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct FilterOperators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,
    /// Case-sensitive pattern, `%` and `_` are wildcards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like: Option<String>,
    /// Case-insensitive pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ilike: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nin: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<NullCheck>,
}

impl FilterOperators {
    /// Operator names that take a single string operand
    pub const SCALAR: [&'static str; 8] = ["eq", "ne", "lt", "lte", "gt", "gte", "like", "ilike"];
    /// Operator names that take an array operand
    pub const ARRAY: [&'static str; 2] = ["in", "nin"];

    /// Mutable slot for a scalar operator
    pub(crate) fn scalar_slot(&mut self, op: &str) -> Option<&mut Option<String>> {
        match op {
            "eq" => Some(&mut self.eq),
            "ne" => Some(&mut self.ne),
            "lt" => Some(&mut self.lt),
            "lte" => Some(&mut self.lte),
            "gt" => Some(&mut self.gt),
            "gte" => Some(&mut self.gte),
            "like" => Some(&mut self.like),
            "ilike" => Some(&mut self.ilike),
            _ => None,
        }
    }

    /// Mutable slot for an array operator
    pub(crate) fn array_slot(&mut self, op: &str) -> Option<&mut Option<Vec<String>>> {
        match op {
            "in" => Some(&mut self.r#in),
            "nin" => Some(&mut self.nin),
            _ => None,
        }
    }

    /// Fold `other` into `self` operator by operator: scalar operands of
    /// `other` replace ours, array operands are appended.
    pub(crate) fn merge(&mut self, other: Self) {
        let Self {
            eq,
            ne,
            lt,
            lte,
            gt,
            gte,
            like,
            ilike,
            r#in,
            nin,
            is,
        } = other;
        for (op, operand) in [
            ("eq", eq),
            ("ne", ne),
            ("lt", lt),
            ("lte", lte),
            ("gt", gt),
            ("gte", gte),
            ("like", like),
            ("ilike", ilike),
        ] {
            if let (Some(operand), Some(slot)) = (operand, self.scalar_slot(op)) {
                *slot = Some(operand);
            }
        }
        for (op, values) in [("in", r#in), ("nin", nin)] {
            if let (Some(values), Some(slot)) = (values, self.array_slot(op)) {
                slot.get_or_insert_with(Vec::new).extend(values);
            }
        }
        if is.is_some() {
            self.is = is;
        }
    }
}

/// OpenAPI description of the list query parameters.
///
/// Requests are parsed by [`QuerySpec`]; this type only documents them.
/// Bracket filters (`filter[status][eq]=present`, `filter[status][in][]=late`)
/// cannot be expressed as a fixed parameter list and are documented through
/// the JSON form of `filter`.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page number, 1-based. Invalid values fall back to 1.
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Rows per page. Invalid values fall back to 10, large values are clamped.
    #[param(example = 10)]
    pub limit: Option<u64>,
    /// Case-insensitive text contained in any searchable column
    #[param(example = "jane")]
    pub search: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`
    #[param(example = "2024-01-01")]
    pub from_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    #[param(example = "2024-01-31")]
    pub to_date: Option<String>,
    /// Field to sort by; the resource default when empty
    #[param(example = "date")]
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub sort_order: Option<SortOrder>,
    /// JSON object of operator sets keyed by field
    #[param(example = json!({"status": {"in": ["late", "absent"]}, "exit_time": {"is": "null"}}))]
    pub filter: Option<String>,
}

/// Parser defaults and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    pub default_page: u64,
    pub default_limit: u64,
    /// Larger limits are clamped to this value
    pub max_limit: u64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_limit: 10,
            max_limit: 250,
        }
    }
}
