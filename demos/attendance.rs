//! Attendance tracker list API
//!
//! ```bash
//! RUST_LOG=querycrate=debug cargo run --example attendance
//! ```
//!
//! Identity comes from the `x-user-id` / `x-user-role` headers:
//!
//! ```bash
//! curl -H 'x-user-id: hr_1' -H 'x-user-role: HR' \
//!   'localhost:3000/attendance?search=emp&from_date=2024-01-01&to_date=2024-01-31'
//! curl -H 'x-user-id: emp_1' 'localhost:3000/attendance/me?sort_by=date&sort_order=asc'
//! curl 'localhost:3000/employees/emp_1/attendance?filter[status][eq]=late'
//! ```

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    routing::get,
};
use chrono::{DateTime, Utc};
use querycrate::{
    ApiError, ApiResponse, ColumnHandle, ErrorEnvelope, HeaderPrincipalResolver, ListPage,
    ListParams, ListQuery, Principal, PrincipalResolver, QuerySpec, ResourceQueryConfig, Role,
    SortOrder, ValidationIssue, ValidationIssues, fetch_one,
    filtering::build_date_range_condition, require_principal, require_role,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, Database,
    DatabaseConnection, EntityTrait, QueryFilter, Schema,
};
use serde::Deserialize;
use std::{env, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::{OpenApi, ToSchema};

mod attendance {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "attendance")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub user_id: String,
        pub status: String,
        pub rssi: Option<String>,
        pub hours: i32,
        pub date: DateTimeUtc,
        pub entry_time: DateTimeUtc,
        pub exit_time: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Clone)]
struct AppState {
    db: DatabaseConnection,
    attendance: Arc<ResourceQueryConfig<attendance::Entity>>,
    resolver: Arc<dyn PrincipalResolver>,
}

/// Caller of the request, if any
struct CurrentUser(Option<Principal>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        Ok(Self(state.resolver.resolve(parts).await?))
    }
}

fn attendance_config() -> Result<ResourceQueryConfig<attendance::Entity>, querycrate::ConfigError> {
    ResourceQueryConfig::builder("attendance")
        .searchable([attendance::Column::Id, attendance::Column::UserId])
        .default_sort(attendance::Column::Date, SortOrder::Desc)
        .date_column(attendance::Column::Date)
        .build()
}

async fn list_with(
    state: &AppState,
    config: &ResourceQueryConfig<attendance::Entity>,
    spec: &QuerySpec,
) -> Result<ListPage<attendance::Model>, ApiError> {
    ListQuery::new(config, spec)
        .plan(state.db.get_database_backend())?
        .fetch(&state.db)
        .await
}

/// All attendance records (ADMIN and HR only)
#[utoipa::path(
    get,
    path = "/attendance",
    params(ListParams),
    responses(
        (status = 200, description = "Page of attendance records"),
        (status = 400, description = "Invalid query parameters", body = ErrorEnvelope),
        (status = 401, description = "Authentication required", body = ErrorEnvelope),
        (status = 403, description = "Role not allowed", body = ErrorEnvelope),
    )
)]
async fn list_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    spec: QuerySpec,
) -> Result<ListPage<attendance::Model>, ApiError> {
    let user = require_principal(user)?;
    require_role(&user, &[Role::Admin, Role::Hr])?;
    list_with(&state, &state.attendance, &spec).await
}

/// Attendance records of one employee
#[utoipa::path(
    get,
    path = "/employees/{id}/attendance",
    params(("id" = String, Path, description = "Employee id"), ListParams),
    responses(
        (status = 200, description = "Page of attendance records"),
        (status = 400, description = "Invalid query parameters", body = ErrorEnvelope),
    )
)]
async fn list_employee_attendance(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    spec: QuerySpec,
) -> Result<ListPage<attendance::Model>, ApiError> {
    let config = state
        .attendance
        .scoped(Condition::all().add(attendance::Column::UserId.eq(employee_id)));
    list_with(&state, &config, &spec).await
}

/// Attendance records of the caller
#[utoipa::path(
    get,
    path = "/attendance/me",
    params(ListParams),
    responses(
        (status = 200, description = "Page of attendance records"),
        (status = 401, description = "Authentication required", body = ErrorEnvelope),
    )
)]
async fn list_my_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    spec: QuerySpec,
) -> Result<ListPage<attendance::Model>, ApiError> {
    let user = require_principal(user)?;
    let config = state
        .attendance
        .scoped(Condition::all().add(attendance::Column::UserId.eq(user.id)));
    list_with(&state, &config, &spec).await
}

#[derive(Debug, Deserialize, ToSchema)]
struct NewAttendance {
    user_id: String,
    status: String,
    rssi: Option<String>,
    #[serde(default)]
    hours: i32,
    /// Defaults to now
    date: Option<DateTime<Utc>>,
    entry_time: Option<DateTime<Utc>>,
    exit_time: Option<DateTime<Utc>>,
}

impl NewAttendance {
    fn validate(&self) -> Result<(), ValidationIssues> {
        let mut issues = ValidationIssues::new();
        if self.user_id.trim().is_empty() {
            issues.add(ValidationIssue::new("too_small", &["user_id"], "Required"));
        }
        if self.status.trim().is_empty() {
            issues.add(ValidationIssue::new("too_small", &["status"], "Required"));
        }
        if self.hours < 0 {
            issues.add(ValidationIssue::new(
                "too_small",
                &["hours"],
                "Number must be greater than or equal to 0",
            ));
        }
        issues.result()
    }
}

/// Record attendance; at most one record per user per day
#[utoipa::path(
    post,
    path = "/attendance",
    request_body = NewAttendance,
    responses(
        (status = 201, description = "Record created"),
        (status = 400, description = "Invalid body", body = ErrorEnvelope),
        (status = 409, description = "Already recorded for this day", body = ErrorEnvelope),
    )
)]
async fn create_attendance(
    State(state): State<AppState>,
    Json(input): Json<NewAttendance>,
) -> Result<ApiResponse<attendance::Model>, ApiError> {
    input.validate()?;

    let date = input.date.unwrap_or_else(Utc::now);
    let offset = state.attendance.timezone();
    let day = date.with_timezone(&offset).date_naive();
    let same_day = build_date_range_condition(
        &ColumnHandle::of(attendance::Column::Date),
        Some(day),
        Some(day),
        offset,
    );

    let mut existing =
        attendance::Entity::find().filter(attendance::Column::UserId.eq(input.user_id.as_str()));
    if let Some(same_day) = same_day {
        existing = existing.filter(same_day);
    }
    if let Some(record) = existing.one(&state.db).await? {
        return Err(ApiError::duplicate(
            "Attendance record already exists for this user on this date",
            Some(record.id),
        ));
    }

    let model = attendance::ActiveModel {
        id: Set(uuid::Uuid::new_v4().simple().to_string()),
        user_id: Set(input.user_id),
        status: Set(input.status),
        rssi: Set(input.rssi),
        hours: Set(input.hours),
        date: Set(date),
        entry_time: Set(input.entry_time.unwrap_or(date)),
        exit_time: Set(input.exit_time),
    }
    .insert(&state.db)
    .await?;

    tracing::info!(id = %model.id, user_id = %model.user_id, "Recorded attendance");
    Ok(ApiResponse::created(model))
}

/// One attendance record
#[utoipa::path(
    get,
    path = "/attendance/{id}",
    params(("id" = String, Path, description = "Attendance record id")),
    responses(
        (status = 200, description = "The record"),
        (status = 404, description = "No such record", body = ErrorEnvelope),
    )
)]
async fn get_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<attendance::Model>, ApiError> {
    let record = fetch_one(&*state.attendance, &id, &state.db).await?;
    Ok(ApiResponse::item(record))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_attendance,
        list_employee_attendance,
        list_my_attendance,
        create_attendance,
        get_attendance
    ),
    components(schemas(ErrorEnvelope, NewAttendance, Role))
)]
struct ApiDoc;

async fn seed(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    db.execute(backend.build(
        schema
            .create_table_from_entity(attendance::Entity)
            .if_not_exists(),
    ))
    .await?;

    for (index, (user_id, status, day)) in [
        ("emp_1", "present", 2),
        ("emp_1", "late", 3),
        ("emp_2", "present", 2),
        ("emp_2", "absent", 3),
        ("emp_3", "present", 3),
    ]
    .into_iter()
    .enumerate()
    {
        let date = format!("2024-01-0{day}T09:00:00Z")
            .parse::<DateTime<Utc>>()
            .map_err(|e| sea_orm::DbErr::Custom(e.to_string()))?;
        attendance::ActiveModel {
            id: Set(format!("att_{index}")),
            user_id: Set(user_id.to_string()),
            status: Set(status.to_string()),
            rssi: Set(None),
            hours: Set(8),
            date: Set(date),
            entry_time: Set(date),
            exit_time: Set(None),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let db = Database::connect(&database_url).await?;
    seed(&db).await?;

    let state = AppState {
        db,
        attendance: Arc::new(attendance_config()?),
        resolver: Arc::new(HeaderPrincipalResolver::default()),
    };

    let app = Router::new()
        .route("/attendance", get(list_attendance).post(create_attendance))
        .route("/attendance/me", get(list_my_attendance))
        .route("/attendance/{id}", get(get_attendance))
        .route("/employees/{id}/attendance", get(list_employee_attendance))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("API: http://0.0.0.0:3000/attendance, docs: http://0.0.0.0:3000/openapi.json");
    axum::serve(listener, app).await?;
    Ok(())
}
