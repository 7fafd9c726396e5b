use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use sea_orm::{ColumnType, Condition, Value, sea_query::Expr};

use crate::resource::ColumnHandle;

/// Local midnight of `date`
#[must_use]
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last millisecond of `date` (23:59:59.999)
#[must_use]
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last)
}

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    // A fixed offset maps every local time to exactly one instant
    offset
        .from_local_datetime(&local)
        .single()
        .map_or_else(|| local.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// Bound value matching how the column stores time
fn bound_value(
    column_type: &ColumnType,
    date: NaiveDate,
    local: NaiveDateTime,
    offset: FixedOffset,
) -> Value {
    match column_type {
        ColumnType::Date => Value::from(date),
        ColumnType::DateTime | ColumnType::Timestamp => {
            Value::from(to_utc(local, offset).naive_utc())
        }
        _ => Value::from(to_utc(local, offset)),
    }
}

/// `col >= start_of_day(from)` AND `col <= end_of_day(to)`, both optional
/// and both inclusive. Returns `None` when neither bound is given.
#[must_use]
pub fn build_date_range_condition(
    column: &ColumnHandle,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    offset: FixedOffset,
) -> Option<Condition> {
    if from.is_none() && to.is_none() {
        return None;
    }

    let mut condition = Condition::all();
    if let Some(from) = from {
        let value = bound_value(column.column_type(), from, start_of_day(from), offset);
        condition = condition.add(Expr::expr(column.expr()).gte(value));
    }
    if let Some(to) = to {
        let value = bound_value(column.column_type(), to, end_of_day(to), offset);
        condition = condition.add(Expr::expr(column.expr()).lte(value));
    }
    Some(condition)
}
