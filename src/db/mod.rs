use crate::errors::DbError;
use async_trait::async_trait;
use serde_json::Value;

pub mod postgres;

/// Runs generated statements. The query engine only ever talks to this trait.
#[async_trait]
pub trait DbClient {
    /// Executes `sql` with positional `params` and returns each row as a JSON object.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DbError>;
    async fn ping(&self) -> Result<(), DbError>;
}
