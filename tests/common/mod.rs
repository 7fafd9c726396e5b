#![allow(dead_code)]

use axum::{Router, body::Body, http::Request, response::Response};
use chrono::{DateTime, TimeZone, Utc};
use querycrate::{JoinSpec, ResourceQueryConfig, ResourceState, SortOrder, resource_router};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database, DatabaseConnection, DbErr,
    Schema,
};
use sea_orm_migration::prelude::*;
use serde_json::Value;
use tower::ServiceExt;

pub mod attendance;
pub mod employee;

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

/// File-backed database behind a single pooled connection, so a connection
/// that is never returned blocks every later statement
pub async fn setup_single_connection_db(name: &str) -> Result<DatabaseConnection, DbErr> {
    let path = std::env::temp_dir().join(format!(
        "querycrate_{name}_{}.sqlite",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn employee_config() -> ResourceQueryConfig<employee::Entity> {
    ResourceQueryConfig::builder("employees")
        .searchable([employee::Column::Name, employee::Column::Email])
        .default_sort(employee::Column::BadgeNumber, SortOrder::Asc)
        .alias("createdAt", employee::Column::CreatedAt)
        .join(JoinSpec::left(employee::Relation::Attendance))
        .field("attendance_status", attendance::Column::Status)
        .build()
        .expect("employee config is valid")
}

pub fn attendance_config() -> ResourceQueryConfig<attendance::Entity> {
    ResourceQueryConfig::builder("attendance")
        .searchable([attendance::Column::Id, attendance::Column::UserId])
        .default_sort(attendance::Column::Date, SortOrder::Desc)
        .date_column(attendance::Column::Date)
        .build()
        .expect("attendance config is valid")
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    let api = Router::new()
        .nest(
            "/employees",
            resource_router(ResourceState::new(db.clone(), employee_config())),
        )
        .nest(
            "/attendance",
            resource_router(ResourceState::new(db, attendance_config())),
        );

    Router::new().nest("/api/v1", api)
}

pub async fn get_json(app: &Router, uri: &str) -> (axum::http::StatusCode, Value) {
    let response: Response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub async fn insert_employee(
    db: &DatabaseConnection,
    id: &str,
    name: &str,
    badge_number: i32,
) -> employee::Model {
    employee::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        email: Set(format!("{id}@example.com")),
        badge_number: Set(badge_number),
        active: Set(badge_number % 2 == 0),
        created_at: Set(
            at(2024, 1, 1, 8, 0, 0) + chrono::Duration::minutes(i64::from(badge_number)),
        ),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_attendance(
    db: &DatabaseConnection,
    id: &str,
    user_id: &str,
    status: &str,
    date: DateTime<Utc>,
) -> attendance::Model {
    attendance::ActiveModel {
        id: Set(id.to_string()),
        user_id: Set(user_id.to_string()),
        status: Set(status.to_string()),
        rssi: Set(None),
        hours: Set(8),
        date: Set(date),
        entry_time: Set(date),
        exit_time: Set(None),
    }
    .insert(db)
    .await
    .unwrap()
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateAttendanceTables)]
    }
}

pub struct CreateAttendanceTables;

impl MigrationName for CreateAttendanceTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_attendance_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateAttendanceTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());
        manager
            .create_table(schema.create_table_from_entity(employee::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(attendance::Entity))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(attendance::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(employee::Entity).to_owned())
            .await?;
        Ok(())
    }
}
