use serde::{Deserialize, Serialize};

/// A known table: the columns a query may reference and the tables it joins to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    pub allowed_columns: Vec<String>,
    pub relations: Vec<Relation>,
    pub is_junction_table: bool,
    pub junction_for: Option<Vec<String>>,
}

/// Directed relation declared on a table. `local_column` belongs to the
/// declaring table, `remote_column` to `table`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub table: String,
    pub local_column: String,
    pub remote_column: String,
}

/// Join columns between two tables, oriented in the direction they were requested.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelationPair {
    pub from_field: String,
    pub to_field: String,
}

impl TableSchema {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            allowed_columns: columns.iter().map(|c| c.to_string()).collect(),
            relations: Vec::new(),
            is_junction_table: false,
            junction_for: None,
        }
    }

    pub fn relation(mut self, table: &str, local_column: &str, remote_column: &str) -> Self {
        self.relations.push(Relation {
            table: table.to_string(),
            local_column: local_column.to_string(),
            remote_column: remote_column.to_string(),
        });
        self
    }

    pub fn junction(mut self, left: &str, right: &str) -> Self {
        self.is_junction_table = true;
        self.junction_for = Some(vec![left.to_string(), right.to_string()]);
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.allowed_columns.iter().any(|c| c == column)
    }

    pub fn relation_to(&self, table: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.table == table)
    }
}
