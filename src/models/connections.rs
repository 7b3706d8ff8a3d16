use serde::{Deserialize, Serialize};

use crate::errors::DbError;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl ConnectionConfig {
    /// Reads `DATABASE_URL` and `DB_MAX_CONNECTIONS` from the environment.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DbError::Config("DATABASE_URL must be set".to_string()))?;

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(DbError::Config(format!(
                        "DB_MAX_CONNECTIONS must be a positive integer, got '{}'",
                        raw
                    )))
                }
            },
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}
