use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A column picked for the select list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub table: String,
    #[serde(rename = "name", alias = "column")]
    pub column: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl FieldRef {
    pub fn new(table: &str, column: &str, display_name: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            display_name: display_name.to_string(),
            data_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    /// Anything the client sent that is not a supported join type.
    Unknown(String),
}

impl JoinType {
    pub const SUPPORTED: [&'static str; 3] = ["INNER", "LEFT", "RIGHT"];

    pub fn as_str(&self) -> &str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Unknown(other) => other,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, JoinType::Unknown(_))
    }
}

impl From<String> for JoinType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INNER" => JoinType::Inner,
            "LEFT" => JoinType::Left,
            "RIGHT" => JoinType::Right,
            _ => JoinType::Unknown(value),
        }
    }
}

impl From<JoinType> for String {
    fn from(value: JoinType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One JOIN clause: `<type> JOIN to_table ON from_table.from_column = to_table.to_column`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    #[serde(default)]
    pub id: String,
    pub from_table: String,
    #[serde(rename = "fromField", alias = "fromColumn")]
    pub from_column: String,
    pub to_table: String,
    #[serde(rename = "toField", alias = "toColumn")]
    pub to_column: String,
    #[serde(rename = "type", alias = "joinType")]
    pub join_type: JoinType,
}

impl JoinSpec {
    pub fn new(
        from_table: &str,
        from_column: &str,
        to_table: &str,
        to_column: &str,
        join_type: JoinType,
    ) -> Self {
        Self {
            id: format!("{}-{}", from_table, to_table),
            from_table: from_table.to_string(),
            from_column: from_column.to_string(),
            to_table: to_table.to_string(),
            to_column: to_column.to_string(),
            join_type,
        }
    }

    /// True when this join links `a` and `b`, in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from_table == a && self.to_table == b) || (self.from_table == b && self.to_table == a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Like,
    In,
    IsNull,
    IsNotNull,
    Unsupported(String),
}

impl FilterOperator {
    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::GtEq => ">=",
            FilterOperator::LtEq => "<=",
            FilterOperator::Like => "LIKE",
            FilterOperator::In => "IN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
            FilterOperator::Unsupported(other) => other,
        }
    }
}

impl From<String> for FilterOperator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "=" => FilterOperator::Eq,
            "!=" => FilterOperator::NotEq,
            ">" => FilterOperator::Gt,
            "<" => FilterOperator::Lt,
            ">=" => FilterOperator::GtEq,
            "<=" => FilterOperator::LtEq,
            "LIKE" => FilterOperator::Like,
            "IN" => FilterOperator::In,
            "IS NULL" => FilterOperator::IsNull,
            "IS NOT NULL" => FilterOperator::IsNotNull,
            _ => FilterOperator::Unsupported(value),
        }
    }
}

impl From<FilterOperator> for String {
    fn from(value: FilterOperator) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default)]
    pub id: String,
    /// `table.column`
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

impl FilterSpec {
    pub fn new(field: &str, operator: FilterOperator, value: Value) -> Self {
        Self {
            id: field.to_string(),
            field: field.to_string(),
            operator,
            value,
            logical_operator: None,
        }
    }

    /// Splits `field` into `(table, column)`.
    pub fn column_ref(&self) -> Option<(&str, &str)> {
        split_column_ref(&self.field)
    }
}

pub(crate) fn split_column_ref(field: &str) -> Option<(&str, &str)> {
    field.split_once('.')
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// `table.column`
    pub field: String,
    pub direction: SortDirection,
}

/// Untrusted description of a query as submitted by a client.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescription {
    #[serde(default)]
    pub selected_tables: Vec<String>,
    #[serde(default)]
    pub selected_fields: Vec<FieldRef>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl QueryDescription {
    pub fn with_joins(&self, joins: Vec<JoinSpec>) -> Self {
        Self {
            joins,
            ..self.clone()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueryDebug {
    pub tables: Vec<String>,
    pub fields: Vec<FieldRef>,
    pub filters: Vec<FilterSpec>,
    pub joins: Vec<JoinSpec>,
    pub parameters: Vec<Value>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub sql: String,
    pub parameters: Vec<Value>,
    #[serde(rename = "data")]
    pub rows: Vec<Value>,
    pub columns: Vec<String>,
    pub row_count: usize,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
    pub debug: QueryDebug,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Connectivity {
    pub is_connected: bool,
    pub disconnected_tables: Vec<String>,
}

/// Validator output plus the joins the resolver would add.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    #[serde(flatten)]
    pub report: ValidationReport,
    pub suggested_joins: Vec<JoinSpec>,
    pub connectivity: Connectivity,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutoJoinRequest {
    pub new_table: String,
    pub existing_tables: Vec<String>,
    #[serde(default)]
    pub existing_joins: Vec<JoinSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutoJoinResponse {
    pub new_joins: Vec<JoinSpec>,
    pub optimized_joins: Vec<JoinSpec>,
    pub message: String,
}
