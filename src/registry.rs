use std::collections::HashSet;

use serde::Serialize;

use crate::{
    errors::QueryError,
    models::schema::{RelationPair, TableSchema},
};

/// Read-only fact base of queryable tables. Built once at startup and shared.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    /// Builds a registry, rejecting duplicate tables, relations to unknown
    /// tables or columns, and junction tables whose endpoints are missing.
    pub fn new(tables: Vec<TableSchema>) -> Result<Self, QueryError> {
        let mut names = HashSet::new();
        for table in &tables {
            if !names.insert(table.name.as_str()) {
                return Err(QueryError::Schema(format!(
                    "Duplicate table in schema: {}",
                    table.name
                )));
            }
        }

        let registry = Self { tables };
        for table in &registry.tables {
            for relation in &table.relations {
                let target = registry.lookup(&relation.table).ok_or_else(|| {
                    QueryError::Schema(format!(
                        "Relation {} -> {} points to an unknown table",
                        table.name, relation.table
                    ))
                })?;
                if !table.has_column(&relation.local_column) {
                    return Err(QueryError::Schema(format!(
                        "Relation {} -> {} uses unknown column {}.{}",
                        table.name, relation.table, table.name, relation.local_column
                    )));
                }
                if !target.has_column(&relation.remote_column) {
                    return Err(QueryError::Schema(format!(
                        "Relation {} -> {} uses unknown column {}.{}",
                        table.name, relation.table, target.name, relation.remote_column
                    )));
                }
            }

            if let Some(endpoints) = &table.junction_for {
                if let Some(missing) = endpoints.iter().find(|t| registry.lookup(t).is_none()) {
                    return Err(QueryError::Schema(format!(
                        "Junction table {} connects unknown table {}",
                        table.name, missing
                    )));
                }
            }
        }

        Ok(registry)
    }

    /// The StackOverflow sample schema served by the query builder.
    pub fn stackoverflow() -> Result<Self, QueryError> {
        Self::new(vec![
            TableSchema::new("users", &["user_id", "name", "reputation", "link"])
                .relation("questions", "user_id", "user_id")
                .relation("answers", "user_id", "user_id")
                .relation("comments", "user_id", "user_id"),
            TableSchema::new(
                "questions",
                &[
                    "question_id",
                    "title",
                    "is_answered",
                    "answer_count",
                    "view_count",
                    "creation_date",
                    "score",
                    "user_id",
                ],
            )
            .relation("users", "user_id", "user_id")
            .relation("answers", "question_id", "question_id")
            .relation("comments", "question_id", "question_id")
            .relation("question_tags", "question_id", "question_id"),
            TableSchema::new(
                "answers",
                &[
                    "answers_id",
                    "body",
                    "creation_date",
                    "score",
                    "is_accepted",
                    "user_id",
                    "question_id",
                ],
            )
            .relation("users", "user_id", "user_id")
            .relation("questions", "question_id", "question_id")
            .relation("comments", "answers_id", "answer_id"),
            TableSchema::new(
                "comments",
                &[
                    "comment_id",
                    "body",
                    "creation_date",
                    "user_id",
                    "answer_id",
                    "question_id",
                ],
            )
            .relation("users", "user_id", "user_id")
            .relation("questions", "question_id", "question_id")
            .relation("answers", "answer_id", "answers_id"),
            TableSchema::new(
                "tags",
                &[
                    "tag_id",
                    "name",
                    "has_synonyms",
                    "is_moderator_only",
                    "is_required",
                    "count",
                ],
            )
            .relation("question_tags", "tag_id", "tag_id"),
            TableSchema::new("question_tags", &["question_id", "tag_id"])
                .relation("questions", "question_id", "question_id")
                .relation("tags", "tag_id", "tag_id")
                .junction("questions", "tags"),
        ])
    }

    pub fn lookup(&self, table: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == table)
    }

    pub fn is_valid_column(&self, table: &str, column: &str) -> bool {
        self.lookup(table).is_some_and(|t| t.has_column(column))
    }

    /// Join columns from `a` to `b`. Tries the relation declared on `a` first,
    /// then the reverse relation declared on `b`.
    pub fn relation_between(&self, a: &str, b: &str) -> Option<RelationPair> {
        let left = self.lookup(a)?;
        let right = self.lookup(b)?;

        if let Some(relation) = left.relation_to(b) {
            return Some(RelationPair {
                from_field: relation.local_column.clone(),
                to_field: relation.remote_column.clone(),
            });
        }

        right.relation_to(a).map(|relation| RelationPair {
            from_field: relation.remote_column.clone(),
            to_field: relation.local_column.clone(),
        })
    }

    /// Table names in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }
}
