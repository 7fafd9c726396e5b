use sea_orm::{
    ColumnType, Condition, DatabaseBackend,
    sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr},
};

use crate::resource::ColumnHandle;

const LIKE_ESCAPE: char = '\\';

/// Trim, collapse whitespace runs to a single space and lowercase
#[must_use]
pub fn normalize_search_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Escape LIKE wildcards so user text only ever matches literally.
/// Escapes: \ (the escape itself), % (match any) and _ (match single char)
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn is_text(column_type: &ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::Char(_) | ColumnType::String(_) | ColumnType::Text
    )
}

/// The column as a text expression: untouched for text columns, cast
/// otherwise (MySQL has no `CAST(... AS TEXT)`)
#[must_use]
pub fn text_expr(column: &ColumnHandle, backend: DatabaseBackend) -> SimpleExpr {
    if is_text(column.column_type()) {
        return column.expr();
    }
    let target = match backend {
        DatabaseBackend::MySql => "CHAR",
        _ => "TEXT",
    };
    Func::cast_as(column.expr(), Alias::new(target)).into()
}

/// `LOWER(col) LIKE '%term%' ESCAPE '\'` OR-ed over `columns`.
///
/// Returns `None` when the normalized term or the column list is empty, so
/// an empty search never restricts the result.
#[must_use]
pub fn build_search_condition(
    term: &str,
    columns: &[ColumnHandle],
    backend: DatabaseBackend,
) -> Option<Condition> {
    let normalized = normalize_search_text(term);
    if normalized.is_empty() || columns.is_empty() {
        return None;
    }

    let pattern = format!("%{}%", escape_like_wildcards(&normalized));
    let condition = columns.iter().fold(Condition::any(), |any, column| {
        any.add(
            Expr::expr(Func::lower(text_expr(column, backend)))
                .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE)),
        )
    });
    Some(condition)
}
