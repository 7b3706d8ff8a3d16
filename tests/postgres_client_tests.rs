use std::env;
use std::sync::Arc;

use erquery::db::postgres::PostgresClient;
use erquery::db::DbClient;
use erquery::errors::QueryError;
use erquery::models::query::{FieldRef, FilterOperator, FilterSpec, OrderBy, QueryDescription, SortDirection};
use erquery::registry::SchemaRegistry;
use erquery::QueryManager;
use serde_json::json;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::Executor;

// Each test works inside its own schema so tests can run in parallel
// without touching real tables. Skipped when DATABASE_URL is not set.
async fn setup_test_db(schema: &str) -> Option<PostgresClient> {
    dotenv::dotenv().ok();
    let Ok(database_url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to the database");
    admin
        .execute(format!("DROP SCHEMA IF EXISTS {schema} CASCADE; CREATE SCHEMA {schema}").as_str())
        .await
        .unwrap();

    let options: PgConnectOptions = database_url.parse().unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(options.options([("search_path", schema)]))
        .await
        .unwrap();

    pool.execute(
        r#"
            CREATE TABLE users (
                user_id INTEGER PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                reputation INTEGER NOT NULL,
                link TEXT
            );
            CREATE TABLE questions (
                question_id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                is_answered BOOLEAN NOT NULL,
                answer_count INTEGER NOT NULL,
                view_count INTEGER NOT NULL,
                creation_date TIMESTAMP NOT NULL,
                score INTEGER NOT NULL,
                user_id INTEGER REFERENCES users (user_id)
            );
            INSERT INTO users VALUES
                (1, 'Alice', 250, NULL),
                (2, 'Bob', 40, 'https://example.com/bob');
            INSERT INTO questions VALUES
                (10, 'Borrow checker woes', true, 2, 120, '2024-03-01 10:00:00', 5, 1),
                (11, 'Async traits', false, 0, 15, '2024-05-20 08:30:00', 1, 2),
                (12, 'Lifetimes explained', true, 4, 900, '2024-06-02 12:00:00', 12, 1);
            "#,
    )
    .await
    .unwrap();

    Some(PostgresClient { pool })
}

fn manager(client: PostgresClient) -> QueryManager {
    QueryManager::new(Arc::new(SchemaRegistry::stackoverflow().unwrap()), Arc::new(client))
}

#[tokio::test]
async fn test_query_decodes_rows() {
    let Some(client) = setup_test_db("erquery_decode").await else {
        return;
    };

    client.ping().await.unwrap();

    let rows = client
        .query(
            "SELECT user_id, name, link FROM users WHERE reputation > $1 ORDER BY user_id",
            &[json!(100)],
        )
        .await
        .unwrap();

    assert_eq!(rows, vec![json!({"user_id": 1, "name": "Alice", "link": null})]);
}

#[tokio::test]
async fn test_execute_joined_query() {
    let Some(client) = setup_test_db("erquery_execute").await else {
        return;
    };
    let manager = manager(client);

    let query = QueryDescription {
        selected_tables: vec!["users".to_string(), "questions".to_string()],
        selected_fields: vec![
            FieldRef::new("users", "name", "Author"),
            FieldRef::new("questions", "title", "Title"),
        ],
        filters: vec![
            FilterSpec::new("users.reputation", FilterOperator::Gt, json!("100")),
            FilterSpec::new("questions.creation_date", FilterOperator::GtEq, json!("2024-04-01")),
        ],
        order_by: Some(OrderBy {
            field: "questions.score".to_string(),
            direction: SortDirection::Desc,
        }),
        ..Default::default()
    };

    let result = manager.execute(&query).await.unwrap();

    assert_eq!(result.row_count, 1);
    assert_eq!(result.columns, vec!["Author", "Title"]);
    assert_eq!(result.rows, vec![json!({"Author": "Alice", "Title": "Lifetimes explained"})]);
    assert_eq!(result.parameters, vec![json!(100), json!("2024-04-01")]);
    assert_eq!(result.debug.joins.len(), 1);
}

#[tokio::test]
async fn test_execution_failure_keeps_sql() {
    let Some(client) = setup_test_db("erquery_failure").await else {
        return;
    };
    let manager = manager(client);

    // answers is part of the schema but not of this database
    let query = QueryDescription {
        selected_tables: vec!["answers".to_string()],
        selected_fields: vec![FieldRef::new("answers", "body", "Body")],
        ..Default::default()
    };

    match manager.execute(&query).await {
        Err(QueryError::Execution { sql, .. }) => {
            assert_eq!(sql, "SELECT answers.body AS \"Body\" FROM answers");
        }
        other => panic!("expected execution error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_column_is_an_error() {
    let Some(client) = setup_test_db("erquery_numeric").await else {
        return;
    };

    let err = client.query("SELECT 1.5::numeric AS ratio", &[]).await.unwrap_err();
    assert!(matches!(err, erquery::errors::DbError::Decode(_)));

    let rows = client.query("SELECT 'so'::varchar AS site", &[]).await.unwrap();
    assert_eq!(rows, vec![json!({"site": "so"})]);
}

#[tokio::test]
async fn test_null_comparison_matches_nothing() {
    let Some(client) = setup_test_db("erquery_null_cmp").await else {
        return;
    };
    let manager = manager(client);

    let query = QueryDescription {
        selected_tables: vec!["users".to_string()],
        selected_fields: vec![FieldRef::new("users", "name", "Name")],
        filters: vec![FilterSpec::new("users.reputation", FilterOperator::Gt, json!("NULL"))],
        ..Default::default()
    };

    let result = manager.execute(&query).await.unwrap();
    assert_eq!(result.row_count, 0);
    assert!(result.parameters.is_empty());
}
