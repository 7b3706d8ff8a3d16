use erquery::db::postgres::PostgresClient;
use erquery::models::connections::ConnectionConfig;
use erquery::models::query::{AutoJoinRequest, QueryDescription};
use erquery::registry::SchemaRegistry;
use erquery::query::QueryEngine;
use erquery::{read_payload, QueryManager};
use log::info;
use serde::Serialize;
use std::env;
use std::path::Path;
use std::sync::Arc;

const USAGE: &str = "usage: erquery <schema | validate FILE | execute FILE | auto-joins FILE>";

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).ok_or(USAGE)?;
    let payload = args.get(1).map(Path::new);

    let registry = Arc::new(SchemaRegistry::stackoverflow()?);

    match (command, payload) {
        ("schema", _) => print_json(registry.as_ref()),
        ("validate", Some(path)) => {
            let query: QueryDescription = read_payload(path)?;
            let engine = QueryEngine::new(registry);
            print_json(&engine.validate_with_suggestions(&query))
        }
        ("auto-joins", Some(path)) => {
            let request: AutoJoinRequest = read_payload(path)?;
            let engine = QueryEngine::new(registry);
            print_json(&engine.auto_joins(&request)?)
        }
        ("execute", Some(path)) => {
            let query: QueryDescription = read_payload(path)?;
            let config = ConnectionConfig::from_env()?;
            let client = PostgresClient::connect(&config).await?;
            let manager = QueryManager::new(registry, Arc::new(client));
            manager.health_check().await?;
            info!("Connected to database");
            print_json(&manager.execute(&query).await?)
        }
        _ => Err(USAGE.into()),
    }
}
