use serde_json::Value;
use thiserror::Error;

use crate::models::query::JoinSpec;

/// Error type for the database executor.
#[derive(Error, Debug)]
pub enum DbError {
    /// Error that occurs during database interactions (e.g., SQL query failure).
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// Configuration error (e.g., invalid database URL or missing parameters).
    #[error("Configuration error: {0}")]
    Config(String),
    /// Connection error (e.g., issues with network or database connection).
    #[error("Connection error: {0}")]
    Connection(String),
    /// A row value could not be converted to JSON.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Error type for building and running a query description.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Unknown table or column outside of regular validation.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid query: {}", errors.join("; "))]
    Validation {
        errors: Vec<String>,
        warnings: Vec<String>,
    },

    #[error("Selected tables are not connected by joins: {}", format_groups(groups))]
    Connectivity { groups: Vec<Vec<String>> },

    /// Joins that could never be placed after the tables already in scope.
    #[error(
        "Could not order joins: {}. Available tables: {}",
        format_failed_joins(failed),
        available.join(", ")
    )]
    UnorderableJoins {
        failed: Vec<JoinSpec>,
        available: Vec<String>,
        missing: Vec<String>,
    },

    /// The database rejected the generated statement.
    #[error("Execution error: {source} (sql: {sql})")]
    Execution {
        #[source]
        source: DbError,
        sql: String,
        parameters: Vec<Value>,
    },

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_groups(groups: &[Vec<String>]) -> String {
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| format!("group {}: {}", i + 1, group.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_failed_joins(joins: &[JoinSpec]) -> String {
    joins
        .iter()
        .map(|join| {
            format!(
                "{} -> {} ({} is not available)",
                join.from_table, join.to_table, join.from_table
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
