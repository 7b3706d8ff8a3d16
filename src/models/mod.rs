pub mod connections;
pub mod query;
pub mod schema;
