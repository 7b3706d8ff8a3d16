use log::warn;
use serde_json::Value;

use crate::{
    models::query::{split_column_ref, FilterOperator, FilterSpec, JoinSpec, QueryDescription},
    registry::SchemaRegistry,
};

use super::PlannedQuery;

/// Generated statement with its positional parameters (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub parameters: Vec<Value>,
}

/// Normalizes a filter value before binding: integer strings become
/// integers, `"true"`/`"false"` booleans and `"NULL"` null.
pub fn coerce_value(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };

    if let Ok(number) = text.trim().parse::<i64>() {
        return Value::from(number);
    }
    match text.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "NULL" => Value::Null,
        _ => value.clone(),
    }
}

fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text == "NULL",
        _ => false,
    }
}

fn is_date_column(column: &str) -> bool {
    column.to_lowercase().contains("date")
}

fn quote_alias(alias: &str) -> String {
    format!("\"{}\"", alias.replace('"', "\"\""))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Default)]
struct Parameters {
    values: Vec<Value>,
}

impl Parameters {
    /// Placeholder for `value`. Nulls are written as an untyped `NULL` literal.
    fn push(&mut self, value: &Value) -> String {
        let value = coerce_value(value);
        if value.is_null() {
            return "NULL".to_string();
        }
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

/// Assembles a SELECT statement from a planned query. Literal values only
/// ever reach the statement as positional parameters.
pub struct SqlBuilder<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn build(&self, plan: &PlannedQuery) -> CompiledQuery {
        let query = &plan.query;
        let mut parameters = Parameters::default();

        let conditions: Vec<String> = query
            .filters
            .iter()
            .filter_map(|filter| self.build_condition(filter, &mut parameters))
            .collect();

        let mut clauses = vec![
            format!("SELECT {}", self.build_select(query)),
            format!("FROM {}", plan.primary_table),
        ];
        clauses.extend(self.build_joins(query, &plan.primary_table, &plan.joins));
        if !conditions.is_empty() {
            clauses.push(format!("WHERE {}", conditions.join(" AND ")));
        }
        if let Some(order_by) = self.build_order_by(query) {
            clauses.push(order_by);
        }
        if let Some(limit) = query.limit.filter(|limit| *limit > 0) {
            clauses.push(format!("LIMIT {}", limit));
        }

        CompiledQuery {
            sql: clauses.join(" "),
            parameters: parameters.values,
        }
    }

    fn build_select(&self, query: &QueryDescription) -> String {
        query
            .selected_fields
            .iter()
            .filter_map(|field| {
                if !self.registry.is_valid_column(&field.table, &field.column) {
                    warn!("Skipping invalid field {}.{}", field.table, field.column);
                    return None;
                }
                Some(format!(
                    "{}.{} AS {}",
                    field.table,
                    field.column,
                    quote_alias(&field.display_name)
                ))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// JOIN clauses in plan order, then best-effort LEFT JOINs for selected
    /// tables the plan did not reach.
    fn build_joins(&self, query: &QueryDescription, primary_table: &str, joins: &[JoinSpec]) -> Vec<String> {
        let mut clauses = Vec::new();
        let mut included = vec![primary_table.to_string()];

        for join in joins {
            let valid = self.registry.is_valid_column(&join.from_table, &join.from_column)
                && self.registry.is_valid_column(&join.to_table, &join.to_column)
                && join.join_type.is_supported();
            if !valid {
                warn!("Skipping invalid join {}", join.id);
                continue;
            }
            clauses.push(format!(
                "{} JOIN {} ON {}.{} = {}.{}",
                join.join_type, join.to_table, join.from_table, join.from_column, join.to_table, join.to_column
            ));
            included.push(join.to_table.clone());
        }

        for table in &query.selected_tables {
            if included.contains(table) || self.registry.lookup(table).is_none() {
                continue;
            }
            let relation = included
                .iter()
                .find_map(|existing| self.registry.relation_between(existing, table).map(|pair| (existing, pair)));

            match relation {
                Some((existing, pair)) => {
                    clauses.push(format!(
                        "LEFT JOIN {} ON {}.{} = {}.{}",
                        table, existing, pair.from_field, table, pair.to_field
                    ));
                    included.push(table.clone());
                }
                None => warn!("Table {} could not be connected and was left out of the FROM clause", table),
            }
        }

        clauses
    }

    fn build_condition(&self, filter: &FilterSpec, parameters: &mut Parameters) -> Option<String> {
        let Some((table, column)) = filter.column_ref() else {
            warn!("Skipping filter on malformed field {}", filter.field);
            return None;
        };
        if !self.registry.is_valid_column(table, column) {
            warn!("Skipping filter on invalid field {}.{}", table, column);
            return None;
        }

        let target = format!("{}.{}", table, column);
        let cast = if is_date_column(column) { "::date" } else { "" };

        match &filter.operator {
            FilterOperator::Eq if is_null_like(&filter.value) => Some(format!("{} IS NULL", target)),
            FilterOperator::NotEq if is_null_like(&filter.value) => Some(format!("{} IS NOT NULL", target)),
            op @ (FilterOperator::Eq
            | FilterOperator::NotEq
            | FilterOperator::Gt
            | FilterOperator::Lt
            | FilterOperator::GtEq
            | FilterOperator::LtEq) => {
                let placeholder = parameters.push(&filter.value);
                Some(format!("{} {} {}{}", target, op.as_str(), placeholder, cast))
            }
            FilterOperator::Like => {
                let pattern = Value::String(format!("%{}%", value_text(&filter.value)));
                Some(format!("{} LIKE {}", target, parameters.push(&pattern)))
            }
            FilterOperator::In => {
                let items = in_list(&filter.value);
                if items.is_empty() {
                    warn!("Skipping IN filter on {} with no values", target);
                    return None;
                }
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|item| format!("{}{}", parameters.push(item), cast))
                    .collect();
                Some(format!("{} IN ({})", target, placeholders.join(", ")))
            }
            FilterOperator::IsNull => Some(format!("{} IS NULL", target)),
            FilterOperator::IsNotNull => Some(format!("{} IS NOT NULL", target)),
            FilterOperator::Unsupported(op) => {
                warn!("Skipping filter with unsupported operator {}", op);
                None
            }
        }
    }

    fn build_order_by(&self, query: &QueryDescription) -> Option<String> {
        let order_by = query.order_by.as_ref()?;
        match split_column_ref(&order_by.field) {
            Some((table, column)) if self.registry.is_valid_column(table, column) => Some(format!(
                "ORDER BY {}.{} {}",
                table,
                column,
                order_by.direction.as_str()
            )),
            _ => {
                warn!("Ignoring invalid order by field {}", order_by.field);
                None
            }
        }
    }
}

/// Values of an IN filter: a JSON array or a comma-separated string.
fn in_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}
