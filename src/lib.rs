use std::{
    fs,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use db::DbClient;
use errors::QueryError;
use log::info;
use models::query::{
    AutoJoinRequest, AutoJoinResponse, QueryDebug, QueryDescription, QueryResult, ValidationOutcome,
};
use query::QueryEngine;
use registry::SchemaRegistry;
use serde::de::DeserializeOwned;

pub mod db;
pub mod errors;
pub mod models;
pub mod query;
pub mod registry;

/// Reads a JSON request body (query description, auto-join request) from a file.
pub fn read_payload<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, QueryError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Runs query descriptions end to end against an injected database client.
pub struct QueryManager {
    engine: QueryEngine,
    client: Arc<dyn DbClient + Send + Sync>,
}

impl QueryManager {
    pub fn new(registry: Arc<SchemaRegistry>, client: Arc<dyn DbClient + Send + Sync>) -> Self {
        QueryManager {
            engine: QueryEngine::new(registry),
            client,
        }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub async fn execute(&self, query: &QueryDescription) -> Result<QueryResult, QueryError> {
        let started = Instant::now();
        let (plan, compiled) = self.engine.compile(query)?;

        let rows = self
            .client
            .query(&compiled.sql, &compiled.parameters)
            .await
            .map_err(|source| QueryError::Execution {
                source,
                sql: compiled.sql.clone(),
                parameters: compiled.parameters.clone(),
            })?;
        let execution_time_ms = elapsed_ms(started.elapsed());
        info!("Query returned {} rows in {} ms", rows.len(), execution_time_ms);

        Ok(QueryResult {
            columns: query
                .selected_fields
                .iter()
                .map(|field| field.display_name.clone())
                .collect(),
            row_count: rows.len(),
            rows,
            execution_time_ms,
            debug: QueryDebug {
                tables: query.selected_tables.clone(),
                fields: query.selected_fields.clone(),
                filters: query.filters.clone(),
                joins: plan.joins,
                parameters: compiled.parameters.clone(),
                warnings: plan.warnings,
            },
            sql: compiled.sql,
            parameters: compiled.parameters,
        })
    }

    pub fn validate(&self, query: &QueryDescription) -> ValidationOutcome {
        self.engine.validate_with_suggestions(query)
    }

    pub fn auto_joins(&self, request: &AutoJoinRequest) -> Result<AutoJoinResponse, QueryError> {
        self.engine.auto_joins(request)
    }

    pub fn schema(&self) -> &SchemaRegistry {
        self.engine.registry()
    }

    pub async fn health_check(&self) -> Result<(), QueryError> {
        self.client.ping().await.map_err(|source| QueryError::Execution {
            source,
            sql: "SELECT 1".to_string(),
            parameters: Vec::new(),
        })
    }
}
