use std::io::Write;
use std::sync::Arc;

use erquery::errors::QueryError;
use erquery::models::query::{
    AutoJoinRequest, FieldRef, FilterOperator, FilterSpec, JoinSpec, JoinType, QueryDescription,
};
use erquery::query::resolver::{find_connected_components, optimize_joins, JoinResolver};
use erquery::query::QueryEngine;
use erquery::read_payload;
use erquery::registry::SchemaRegistry;
use serde_json::json;

fn registry() -> SchemaRegistry {
    SchemaRegistry::stackoverflow().unwrap()
}

fn engine() -> QueryEngine {
    QueryEngine::new(Arc::new(registry()))
}

fn tables(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn edges(joins: &[JoinSpec]) -> Vec<(&str, &str)> {
    joins
        .iter()
        .map(|j| (j.from_table.as_str(), j.to_table.as_str()))
        .collect()
}

#[test]
fn test_single_table_without_filters() {
    for table in ["users", "questions", "answers", "comments", "tags", "question_tags"] {
        let registry = registry();
        let column = registry.lookup(table).unwrap().allowed_columns[0].clone();
        let query = QueryDescription {
            selected_tables: tables(&[table]),
            selected_fields: vec![FieldRef::new(table, &column, "c")],
            ..Default::default()
        };

        let (_, compiled) = engine().compile(&query).unwrap();
        assert_eq!(compiled.sql.matches("FROM").count(), 1);
        assert!(!compiled.sql.contains("WHERE"));
        assert!(compiled.parameters.is_empty());
    }
}

#[test]
fn test_reputation_filter_round_trip() {
    let query = QueryDescription {
        selected_tables: tables(&["users"]),
        selected_fields: vec![FieldRef::new("users", "name", "name")],
        filters: vec![FilterSpec::new("users.reputation", FilterOperator::Gt, json!("100"))],
        ..Default::default()
    };

    let (_, compiled) = engine().compile(&query).unwrap();
    assert!(compiled.sql.contains("FROM users"));
    assert!(compiled.sql.contains("WHERE users.reputation > $1"));
    assert_eq!(compiled.parameters, vec![json!(100)]);
}

#[test]
fn test_null_like_equality_binds_nothing() {
    for value in [json!(null), json!("NULL")] {
        let query = QueryDescription {
            selected_tables: tables(&["comments"]),
            selected_fields: vec![FieldRef::new("comments", "body", "Body")],
            filters: vec![FilterSpec::new("comments.answer_id", FilterOperator::Eq, value)],
            ..Default::default()
        };

        let (_, compiled) = engine().compile(&query).unwrap();
        assert!(compiled.sql.contains("comments.answer_id IS NULL"));
        assert!(compiled.parameters.is_empty());
    }
}

#[test]
fn test_direct_relation_yields_one_left_join() {
    let registry = registry();
    let joins = JoinResolver::new(&registry).generate_automatic_joins(&tables(&["users", "questions"]));

    assert_eq!(joins.len(), 1);
    assert_eq!(edges(&joins), vec![("users", "questions")]);
    assert_eq!(joins[0].join_type, JoinType::Left);
}

#[test]
fn test_three_tables_are_chained() {
    let registry = registry();
    let selected = tables(&["users", "answers", "comments"]);
    let joins = JoinResolver::new(&registry).generate_automatic_joins(&selected);

    assert_eq!(joins.len(), 2);
    assert_eq!(find_connected_components(&selected, &joins).len(), 1);
    assert!(joins.iter().all(|j| j.join_type == JoinType::Left));
}

#[test]
fn test_questions_reach_tags_through_junction() {
    let registry = registry();
    let resolver = JoinResolver::new(&registry);

    let path = resolver.find_path("questions", "tags", &registry.table_names()).unwrap();
    assert_eq!(path, tables(&["questions", "question_tags", "tags"]));

    let joins = resolver.generate_automatic_joins(&tables(&["questions", "tags"]));
    assert_eq!(edges(&joins), vec![("questions", "question_tags"), ("question_tags", "tags")]);
}

#[test]
fn test_auto_joined_query_compiles_to_full_chain() {
    let query = QueryDescription {
        selected_tables: tables(&["questions", "tags"]),
        selected_fields: vec![
            FieldRef::new("questions", "title", "Title"),
            FieldRef::new("tags", "name", "Tag"),
        ],
        filters: vec![FilterSpec::new("tags.name", FilterOperator::Like, json!("rust"))],
        limit: Some(10),
        ..Default::default()
    };

    let (plan, compiled) = engine().compile(&query).unwrap();
    assert_eq!(plan.primary_table, "questions");
    assert_eq!(
        compiled.sql,
        "SELECT questions.title AS \"Title\", tags.name AS \"Tag\" FROM questions \
         LEFT JOIN question_tags ON questions.question_id = question_tags.question_id \
         LEFT JOIN tags ON question_tags.tag_id = tags.tag_id \
         WHERE tags.name LIKE $1 LIMIT 10"
    );
    assert_eq!(compiled.parameters, vec![json!("%rust%")]);
}

#[test]
fn test_two_disjoint_groups() {
    let selected = tables(&["users", "questions", "tags", "question_tags"]);
    let joins = vec![
        JoinSpec::new("users", "user_id", "questions", "user_id", JoinType::Inner),
        JoinSpec::new("question_tags", "tag_id", "tags", "tag_id", JoinType::Inner),
    ];

    let groups = find_connected_components(&selected, &joins);
    assert_eq!(groups.len(), 2);

    let mut union: Vec<String> = groups.concat();
    union.sort();
    let mut expected = selected.clone();
    expected.sort();
    assert_eq!(union, expected);
    assert!(groups[0].iter().all(|t| !groups[1].contains(t)));
}

#[test]
fn test_unconnectable_selection_is_a_connectivity_error() {
    let registry = SchemaRegistry::new(vec![
        erquery::models::schema::TableSchema::new("users", &["user_id"]),
        erquery::models::schema::TableSchema::new("audit", &["event"]),
    ])
    .unwrap();
    let engine = QueryEngine::new(Arc::new(registry));
    let query = QueryDescription {
        selected_tables: tables(&["users", "audit"]),
        selected_fields: vec![FieldRef::new("users", "user_id", "id")],
        ..Default::default()
    };

    match engine.plan(&query) {
        Err(QueryError::Connectivity { groups }) => {
            assert_eq!(groups, vec![tables(&["users"]), tables(&["audit"])]);
        }
        other => panic!("expected connectivity error, got {:?}", other),
    }
}

#[test]
fn test_optimize_is_idempotent() {
    let join = |from: &str, to: &str| JoinSpec::new(from, "id", to, "id", JoinType::Left);
    let joins = vec![
        join("users", "questions"),
        join("questions", "answers"),
        join("answers", "users"),
        join("questions", "comments"),
        join("comments", "answers"),
        join("users", "questions"),
    ];

    let once = optimize_joins(&joins);
    let twice = optimize_joins(&once);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 3);
}

#[test]
fn test_read_payload_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "newTable": "tags",
            "existingTables": ["questions"],
            "existingJoins": []
        }}"#
    )
    .unwrap();

    let request: AutoJoinRequest = read_payload(file.path()).unwrap();
    assert_eq!(request.new_table, "tags");

    let response = engine().auto_joins(&request).unwrap();
    assert_eq!(edges(&response.new_joins), vec![("questions", "question_tags"), ("question_tags", "tags")]);
    assert_eq!(response.optimized_joins, response.new_joins);
}

#[test]
fn test_read_payload_rejects_malformed_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ \"selectedTables\": [").unwrap();

    let err = read_payload::<QueryDescription>(file.path()).unwrap_err();
    assert!(matches!(err, QueryError::Payload(_)));

    let missing = read_payload::<QueryDescription>("/nonexistent/query.json").unwrap_err();
    assert!(matches!(missing, QueryError::Io(_)));
}
