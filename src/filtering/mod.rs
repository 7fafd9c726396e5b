//! # Filtering, Search & Sorting
//!
//! Translates list query parameters into sea-query conditions. User-supplied
//! field names are resolved through the resource's field map and values are
//! always bound as parameters, so nothing from the query string is spliced
//! into SQL text.
//!
//! ## Query Parameter Examples
//!
//! ```text
//! // Paging and sorting
//! GET /attendance?page=2&limit=25&sort_by=date&sort_order=asc
//!
//! // Free-text search over the configured searchable columns
//! GET /attendance?search=jane
//!
//! // Inclusive calendar-day bounds on the date column
//! GET /attendance?from_date=2024-01-01&to_date=2024-01-31
//!
//! // Operator filters, AND-ed together
//! GET /attendance?filter[status][eq]=present&filter[hours][gte]=4
//! GET /attendance?filter[status][in][]=late&filter[status][in][]=absent
//! GET /attendance?filter[note][is]=null
//!
//! // The same filters as JSON
//! GET /attendance?filter={"status":{"nin":["absent"]}}
//! ```
//!
//! ## Main Components
//!
//! - [`query_parser`]: query string to [`QuerySpec`](crate::QuerySpec)
//! - [`search`]: case-insensitive contains search with escaped wildcards
//! - [`date_range`]: start/end of day bounds in the resource's offset
//! - [`conditions`]: typed column filters and the combined predicate
//! - [`sort`]: sort resolution with a primary-key tie-breaker
//! - [`pagination`]: page offset and response metadata

pub mod conditions;
pub mod date_range;
pub mod pagination;
pub mod query_parser;
pub mod search;
pub mod sort;

pub use conditions::{CombinedPredicate, build_predicate, coerce_operand};
pub use date_range::{build_date_range_condition, end_of_day, start_of_day};
pub use pagination::{PaginationMetadata, page_offset};
pub use query_parser::parse_date;
pub use search::{build_search_condition, escape_like_wildcards, normalize_search_text};
pub use sort::{ResolvedSort, SortSource, resolve_sort};
