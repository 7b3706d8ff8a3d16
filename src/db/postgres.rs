use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{
    postgres::{PgArguments, PgPoolOptions, PgRow},
    query::Query,
    Column, Decode, PgPool, Postgres, Row, Type, TypeInfo,
};

use crate::{errors::DbError, models::connections::ConnectionConfig};

use super::DbClient;

pub struct PostgresClient {
    pub pool: PgPool,
}

impl PostgresClient {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }
}

/// Binds a JSON value as the next positional parameter.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                query.bind(int)
            } else if let Some(float) = number.as_f64() {
                query.bind(float)
            } else {
                query.bind(number.to_string())
            }
        }
        Value::String(text) => query.bind(text.clone()),
        other => query.bind(other.to_string()),
    }
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, DbError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| DbError::Decode(e.to_string()))
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, DbError> {
    let value = match type_name {
        "BOOL" => get::<bool>(row, idx)?.map(Value::from),
        "INT2" => get::<i16>(row, idx)?.map(Value::from),
        "INT4" => get::<i32>(row, idx)?.map(Value::from),
        "INT8" => get::<i64>(row, idx)?.map(Value::from),
        "FLOAT4" => get::<f32>(row, idx)?.map(|v| Value::from(f64::from(v))),
        "FLOAT8" => get::<f64>(row, idx)?.map(Value::from),
        "DATE" => get::<NaiveDate>(row, idx)?.map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx)?.map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx)?.map(|v| Value::String(v.to_rfc3339())),
        "JSON" | "JSONB" => get::<Value>(row, idx)?,
        _ => get::<String>(row, idx)?.map(Value::String),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn row_to_json(row: &PgRow) -> Result<Value, DbError> {
    let mut object = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_info().name())?;
        object.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(object))
}

#[async_trait]
impl DbClient for PostgresClient {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DbError> {
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, param| bind_value(query, param));

        let rows = query.fetch_all(&self.pool).await.map_err(DbError::Sqlx)?;

        rows.iter().map(row_to_json).collect()
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;
        Ok(())
    }
}
