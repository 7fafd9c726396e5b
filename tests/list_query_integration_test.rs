use axum::http::StatusCode;
use querycrate::{JoinSpec, ListQuery, QuerySpec, ResourceQueryConfig, SortOrder, fetch_one};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseBackend, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryTrait,
};
use std::collections::BTreeSet;
use std::time::Duration;

mod common;
use common::{
    at, attendance, attendance_config, employee, employee_config, get_json, insert_attendance,
    insert_employee, setup_single_connection_db, setup_test_app, setup_test_db,
};

async fn seed_employees(db: &DatabaseConnection, count: i32) {
    for badge in 1..=count {
        let name = if badge == 3 {
            "Chai Latte".to_string()
        } else {
            format!("Employee {badge:02}")
        };
        insert_employee(db, &format!("emp_{badge:02}"), &name, badge).await;
    }
}

fn ids(body: &serde_json::Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_pagination_metadata_law() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 23).await;
    let app = setup_test_app(db);

    let (status, body) = get_json(&app, "/api/v1/employees?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 5);
    assert_eq!(body["pagination"]["total_items"], 23);
    assert_eq!(body["pagination"]["total_pages"], 5);

    // Walking every page yields each row exactly once
    let mut seen = Vec::new();
    for page in 1..=5 {
        let (_, body) = get_json(&app, &format!("/api/v1/employees?limit=5&page={page}")).await;
        seen.extend(ids(&body));
    }
    let unique: BTreeSet<_> = seen.iter().cloned().collect();
    assert_eq!(seen.len(), 23);
    assert_eq!(unique.len(), 23);

    // Past the end: empty page, same totals
    let (status, body) = get_json(&app, "/api/v1/employees?limit=5&page=9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body).len(), 0);
    assert_eq!(body["pagination"]["total_items"], 23);
}

#[tokio::test]
async fn test_empty_table_has_zero_pages() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(db);

    let (status, body) = get_json(&app, "/api/v1/employees").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!([]));
    assert_eq!(body["pagination"]["total_pages"], 0);
    assert_eq!(body["pagination"]["total_items"], 0);
}

#[tokio::test]
async fn test_stable_pages() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 12).await;
    let app = setup_test_app(db);

    let (_, body) = get_json(
        &app,
        "/api/v1/employees?page=2&limit=5&sort_by=badge_number&sort_order=asc",
    )
    .await;
    let badges: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["badge_number"].as_i64().unwrap())
        .collect();
    assert_eq!(badges, vec![6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn test_ties_are_broken_by_primary_key() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    for suffix in ["d", "a", "c", "b", "e"] {
        insert_employee(&db, &format!("emp_{suffix}"), "Same Name", 7).await;
    }
    let app = setup_test_app(db);

    // Every row has the same name; walk pages of one
    let mut seen = Vec::new();
    for page in 1..=5 {
        let (_, body) = get_json(
            &app,
            &format!("/api/v1/employees?sort_by=name&sort_order=asc&limit=1&page={page}"),
        )
        .await;
        seen.extend(ids(&body));
    }
    assert_eq!(seen, vec!["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]);
}

#[tokio::test]
async fn test_search() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 8).await;
    let app = setup_test_app(db);

    let (_, all) = get_json(&app, "/api/v1/employees?search=").await;
    assert_eq!(all["pagination"]["total_items"], 8);

    let (_, chai) = get_json(&app, "/api/v1/employees?search=chai").await;
    assert_eq!(ids(&chai), vec!["emp_03"]);
    assert_eq!(chai["pagination"]["total_items"], 1);

    let (_, upper) = get_json(&app, "/api/v1/employees?search=%20%20CHAI%20%20LATTE%20").await;
    assert_eq!(ids(&upper), vec!["emp_03"]);

    // Wildcards in the search text match literally
    let (_, wildcard) = get_json(&app, "/api/v1/employees?search=%25").await;
    assert_eq!(wildcard["pagination"]["total_items"], 0);
}

#[tokio::test]
async fn test_unknown_filter_field_is_ignored() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 4).await;
    let app = setup_test_app(db);

    let (status, body) = get_json(&app, "/api/v1/employees?filter[password][eq]=x").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_items"], 4);
}

#[tokio::test]
async fn test_validation_errors_use_envelope() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(db);

    let (status, body) = get_json(&app, "/api/v1/employees?sort_order=ASC").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["name"], "ValidationError");
    assert_eq!(body["error"]["issues"][0]["path"], serde_json::json!(["sort_order"]));

    let (status, body) = get_json(&app, "/api/v1/employees?sort_by=password").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["issues"][0]["path"], serde_json::json!(["sort_by"]));

    let (status, _) = get_json(&app, "/api/v1/attendance?from_date=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/api/v1/employees?filter[badge_number][gt]=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inclusive_date_boundaries() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    insert_employee(&db, "emp_01", "Jane", 1).await;

    let last_moment = at(2024, 1, 5, 23, 59, 59) + chrono::Duration::milliseconds(998);
    insert_attendance(&db, "att_first", "emp_01", "present", at(2024, 1, 5, 0, 0, 0)).await;
    insert_attendance(&db, "att_last", "emp_01", "present", last_moment).await;
    insert_attendance(&db, "att_next", "emp_01", "present", at(2024, 1, 6, 0, 0, 0)).await;
    insert_attendance(&db, "att_before", "emp_01", "present", at(2024, 1, 4, 23, 59, 59)).await;
    let app = setup_test_app(db);

    let (status, body) =
        get_json(&app, "/api/v1/attendance?from_date=2024-01-05&to_date=2024-01-05").await;
    assert_eq!(status, StatusCode::OK);
    let found: BTreeSet<_> = ids(&body).into_iter().collect();
    assert_eq!(
        found,
        ["att_first", "att_last"].into_iter().map(String::from).collect()
    );
    assert_eq!(body["pagination"]["total_items"], 2);
}

#[tokio::test]
async fn test_default_sort_is_newest_first() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    insert_employee(&db, "emp_01", "Jane", 1).await;
    insert_attendance(&db, "att_1", "emp_01", "present", at(2024, 1, 1, 9, 0, 0)).await;
    insert_attendance(&db, "att_3", "emp_01", "late", at(2024, 1, 3, 9, 0, 0)).await;
    insert_attendance(&db, "att_2", "emp_01", "present", at(2024, 1, 2, 9, 0, 0)).await;
    let app = setup_test_app(db);

    let (_, body) = get_json(&app, "/api/v1/attendance").await;
    assert_eq!(ids(&body), vec!["att_3", "att_2", "att_1"]);
}

#[tokio::test]
async fn test_empty_in_and_nin_are_ignored() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 6).await;

    let filter = url_escape::encode_component(r#"{"badge_number":{"in":[],"nin":[]}}"#);
    let spec = QuerySpec::from_query_str(&format!("filter={filter}")).unwrap();
    assert_eq!(spec.filter["badge_number"].r#in, Some(Vec::new()));

    let config = employee_config();
    let page = ListQuery::new(&config, &spec)
        .plan(DatabaseBackend::Sqlite)
        .unwrap()
        .fetch(&db)
        .await
        .unwrap();
    assert_eq!(page.total_items, 6);
}

#[tokio::test]
async fn test_operator_filters() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 10).await;
    let app = setup_test_app(db);

    let (_, body) = get_json(
        &app,
        "/api/v1/employees?filter[badge_number][gte]=3&filter[badge_number][lt]=6",
    )
    .await;
    assert_eq!(ids(&body), vec!["emp_03", "emp_04", "emp_05"]);

    let (_, body) = get_json(
        &app,
        "/api/v1/employees?filter[id][in][]=emp_01&filter[id][in][]=emp_09&filter[active][eq]=false",
    )
    .await;
    assert_eq!(ids(&body), vec!["emp_01", "emp_09"]);

    let (_, body) = get_json(&app, "/api/v1/employees?filter[name][ilike]=%25LATTE").await;
    assert_eq!(ids(&body), vec!["emp_03"]);

    let filter = url_escape::encode_component(r#"{"badge_number":{"nin":["1","2","3"],"lte":"5"}}"#);
    let (status, body) = get_json(&app, &format!("/api/v1/employees?filter={filter}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec!["emp_04", "emp_05"]);
}

#[tokio::test]
async fn test_fan_out_join_counts_each_row_once() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 3).await;
    for day in 1..=4 {
        insert_attendance(
            &db,
            &format!("att_01_{day}"),
            "emp_01",
            "late",
            at(2024, 1, day, 9, 0, 0),
        )
        .await;
    }
    insert_attendance(&db, "att_02_1", "emp_02", "present", at(2024, 1, 1, 9, 0, 0)).await;
    let app = setup_test_app(db);

    // Without a join filter every employee appears once despite four rows for emp_01
    let (_, body) = get_json(&app, "/api/v1/employees").await;
    assert_eq!(ids(&body), vec!["emp_01", "emp_02", "emp_03"]);
    assert_eq!(body["pagination"]["total_items"], 3);

    let (_, body) = get_json(&app, "/api/v1/employees?filter[attendance_status][eq]=late").await;
    assert_eq!(ids(&body), vec!["emp_01"]);
    assert_eq!(body["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn test_data_and_count_share_where_clause() {
    let spec = QuerySpec::from_query_str(
        "search=jane&filter[attendance_status][in][]=late&filter[active][eq]=true&page=3&limit=7",
    )
    .unwrap();
    let config = employee_config();
    let plan = ListQuery::new(&config, &spec)
        .plan(DatabaseBackend::Sqlite)
        .unwrap();

    let data = plan.data_statement(DatabaseBackend::Sqlite);
    let count = plan.count_statement(DatabaseBackend::Sqlite);

    let from_where = |sql: &str| {
        let start = sql.find(" FROM ").unwrap();
        let end = sql
            .find(" GROUP BY ")
            .or_else(|| sql.find(" ORDER BY "))
            .unwrap_or(sql.len());
        sql[start..end].to_string()
    };
    assert_eq!(from_where(&data.sql), from_where(&count.sql));
    assert!(count.sql.contains("LEFT JOIN"), "{}", count.sql);
    assert!(count.sql.contains("COUNT(DISTINCT"), "{}", count.sql);
    assert!(data.sql.contains(r#"GROUP BY "employees"."id""#), "{}", data.sql);

    let data_values = data.values.unwrap().0;
    let count_values = count.values.unwrap().0;
    assert!(data_values.starts_with(&count_values));
    // LIMIT and OFFSET are the only extra binds
    assert_eq!(data_values.len(), count_values.len() + 2);
}

#[tokio::test]
async fn test_scoped_config_restricts_list_and_get() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 2).await;
    insert_attendance(&db, "att_a", "emp_01", "present", at(2024, 1, 1, 9, 0, 0)).await;
    insert_attendance(&db, "att_b", "emp_02", "present", at(2024, 1, 1, 9, 0, 0)).await;
    insert_attendance(&db, "att_c", "emp_01", "late", at(2024, 1, 2, 9, 0, 0)).await;

    let config = attendance_config()
        .scoped(Condition::all().add(attendance::Column::UserId.eq("emp_01")));
    let spec = QuerySpec::from_query_str("search=att").unwrap();
    let page = ListQuery::new(&config, &spec)
        .plan(DatabaseBackend::Sqlite)
        .unwrap()
        .fetch(&db)
        .await
        .unwrap();
    let found: Vec<_> = page.rows.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(found, vec!["att_c", "att_a"]);
    assert_eq!(page.total_items, 2);

    let err = fetch_one(&config, "att_b", &db).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    assert!(fetch_one(&config, "att_a", &db).await.is_ok());
}

#[tokio::test]
async fn test_get_by_id() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    insert_employee(&db, "emp_01", "Jane", 1).await;
    let app = setup_test_app(db);

    let (status, body) = get_json(&app, "/api/v1/employees/emp_01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Jane");
    assert!(body.get("pagination").is_none());

    let (status, body) = get_json(&app, "/api/v1/employees/emp_99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["name"], "NotFoundError");
}

#[tokio::test]
async fn test_sort_by_joined_field_pages_each_row_once() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 3).await;
    insert_attendance(&db, "att_1", "emp_01", "late", at(2024, 1, 1, 9, 0, 0)).await;
    insert_attendance(&db, "att_2", "emp_01", "present", at(2024, 1, 2, 9, 0, 0)).await;
    insert_attendance(&db, "att_3", "emp_01", "absent", at(2024, 1, 3, 9, 0, 0)).await;
    insert_attendance(&db, "att_4", "emp_02", "late", at(2024, 1, 1, 9, 0, 0)).await;
    let app = setup_test_app(db);

    // ASC orders by each employee's smallest status, DESC by its largest;
    // SQLite places NULL (no attendance) first ascending and last descending
    for (order, expected) in [
        ("asc", ["emp_03", "emp_01", "emp_02"]),
        ("desc", ["emp_01", "emp_02", "emp_03"]),
    ] {
        let mut seen = Vec::new();
        for page in 1..=3 {
            let (status, body) = get_json(
                &app,
                &format!(
                    "/api/v1/employees?sort_by=attendance_status&sort_order={order}&limit=2&page={page}"
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["pagination"]["total_items"], 3);
            seen.extend(ids(&body));
        }
        assert_eq!(seen, expected, "sort_order={order}");
    }
}

#[tokio::test]
async fn test_projection_with_joins_keeps_every_entity() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    insert_employee(&db, "emp_a", "Same", 1).await;
    insert_employee(&db, "emp_b", "Same", 2).await;
    insert_attendance(&db, "att_1", "emp_a", "present", at(2024, 1, 1, 9, 0, 0)).await;
    insert_attendance(&db, "att_2", "emp_a", "late", at(2024, 1, 2, 9, 0, 0)).await;
    insert_attendance(&db, "att_3", "emp_b", "present", at(2024, 1, 1, 9, 0, 0)).await;

    let config = ResourceQueryConfig::<employee::Entity>::builder("employees")
        .default_sort(employee::Column::BadgeNumber, SortOrder::Asc)
        .join(JoinSpec::left(employee::Relation::Attendance))
        .field("attendance_status", attendance::Column::Status)
        .select_as("name", employee::Column::Name)
        .select_as("status", attendance::Column::Status)
        .build()
        .unwrap();
    let spec = QuerySpec::default();
    let plan = ListQuery::new(&config, &spec)
        .plan(DatabaseBackend::Sqlite)
        .unwrap();

    let page = plan.fetch_json(&db).await.unwrap();
    assert_eq!(page.total_items, 2);
    assert_eq!(
        page.rows,
        vec![
            serde_json::json!({"name": "Same", "status": "late"}),
            serde_json::json!({"name": "Same", "status": "present"}),
        ]
    );

    // Postgres rejects ORDER BY terms missing from a DISTINCT select list
    let postgres = plan.projected_select().build(DatabaseBackend::Postgres).sql;
    assert!(!postgres.contains("DISTINCT"), "{postgres}");
    assert!(postgres.contains(r#"GROUP BY "employees"."id""#), "{postgres}");
    assert!(postgres.contains(r#"MIN("attendance"."status")"#), "{postgres}");
}

#[tokio::test]
async fn test_fetch_one_applies_joins_of_scope() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_employees(&db, 2).await;
    insert_attendance(&db, "att_1", "emp_01", "late", at(2024, 1, 1, 9, 0, 0)).await;
    insert_attendance(&db, "att_2", "emp_01", "late", at(2024, 1, 2, 9, 0, 0)).await;
    insert_attendance(&db, "att_3", "emp_02", "present", at(2024, 1, 1, 9, 0, 0)).await;

    let late = employee_config()
        .scoped(Condition::all().add(attendance::Column::Status.eq("late")));

    let found = fetch_one(&late, "emp_01", &db).await.unwrap();
    assert_eq!(found.id, "emp_01");

    let err = fetch_one(&late, "emp_02", &db).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancelled_request_leaves_pool_usable() {
    let db = setup_single_connection_db("cancellation")
        .await
        .expect("Failed to setup test database");

    let employees: Vec<employee::ActiveModel> = (0..4_000)
        .map(|i: i32| employee::ActiveModel {
            id: Set(format!("emp_{i:05}")),
            name: Set(format!("Employee {i}")),
            email: Set(format!("emp_{i:05}@example.com")),
            badge_number: Set(i),
            active: Set(i % 2 == 0),
            created_at: Set(at(2024, 1, 1, 8, 0, 0)),
        })
        .collect();
    for chunk in employees.chunks(500) {
        employee::Entity::insert_many(chunk.to_vec())
            .exec(&db)
            .await
            .unwrap();
    }

    // A search over every row keeps the statements busy long enough to be
    // dropped part way through at some of these delays
    for delay in [0, 50, 200, 1_000, 5_000] {
        let task_db = db.clone();
        let handle = tokio::spawn(async move {
            let config = employee_config();
            let spec = QuerySpec::from_query_str("search=employee&sort_by=name&limit=250")
                .unwrap();
            ListQuery::new(&config, &spec)
                .plan(DatabaseBackend::Sqlite)
                .unwrap()
                .fetch_json(&task_db)
                .await
        });
        tokio::time::sleep(Duration::from_micros(delay)).await;
        handle.abort();
        let _ = handle.await;

        // With one pooled connection a leaked connection would block this
        let total = tokio::time::timeout(
            Duration::from_secs(5),
            employee::Entity::find().count(&db),
        )
        .await
        .unwrap_or_else(|_| panic!("pool exhausted after cancelling at {delay}us"))
        .unwrap();
        assert_eq!(total, 4_000);
        assert!(db.get_sqlite_connection_pool().size() <= 1);
    }

    // A request that runs to completion still works afterwards
    let config = employee_config();
    let spec = QuerySpec::from_query_str("search=employee%2039").unwrap();
    let page = ListQuery::new(&config, &spec)
        .plan(DatabaseBackend::Sqlite)
        .unwrap()
        .fetch(&db)
        .await
        .unwrap();
    // Employee 39, 390-399 and 3900-3999
    assert_eq!(page.total_items, 111);
    assert_eq!(page.rows.len(), 10);
}
