use crate::{
    models::query::{split_column_ref, JoinType, QueryDescription, ValidationReport},
    registry::SchemaRegistry,
};

use super::resolver::check_connectivity;

/// Structural checks of a query description against the schema.
///
/// Every problem found is reported; nothing short-circuits.
pub struct QueryValidator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> QueryValidator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Full validation, including connectivity over the declared joins.
    pub fn validate(&self, query: &QueryDescription) -> ValidationReport {
        self.run(query, true)
    }

    /// Validation without the connectivity check, for callers that resolve
    /// missing joins before judging connectivity.
    pub fn validate_structure(&self, query: &QueryDescription) -> ValidationReport {
        self.run(query, false)
    }

    fn run(&self, query: &QueryDescription, check_connected: bool) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_tables(query, &mut errors);
        self.check_fields(query, &mut errors);
        self.check_filters(query, &mut errors);
        self.check_joins(query, &mut errors, &mut warnings);

        if check_connected && query.selected_tables.len() > 1 {
            let connectivity = check_connectivity(&query.selected_tables, &query.joins);
            if !connectivity.is_connected {
                errors.push(format!(
                    "Tables not connected: {}. All tables must be connected by joins.",
                    connectivity.disconnected_tables.join(", ")
                ));
            }
        }

        self.check_junctions(query, &mut warnings);
        self.check_order_by(query, &mut warnings);

        ValidationReport::new(errors, warnings)
    }

    fn check_tables(&self, query: &QueryDescription, errors: &mut Vec<String>) {
        if query.selected_tables.is_empty() {
            errors.push("At least one table must be selected".to_string());
            return;
        }

        let unknown: Vec<&str> = query
            .selected_tables
            .iter()
            .filter(|t| self.registry.lookup(t).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            errors.push(format!("Invalid tables: {}", unknown.join(", ")));
        }
    }

    fn check_fields(&self, query: &QueryDescription, errors: &mut Vec<String>) {
        if query.selected_fields.is_empty() {
            errors.push("At least one field must be selected".to_string());
            return;
        }

        for field in &query.selected_fields {
            match self.registry.lookup(&field.table) {
                None => errors.push(format!("Table not found: {}", field.table)),
                Some(table) if !table.has_column(&field.column) => {
                    errors.push(format!("Field not found: {}.{}", field.table, field.column))
                }
                Some(_) => {}
            }
        }
    }

    fn check_filters(&self, query: &QueryDescription, errors: &mut Vec<String>) {
        for filter in &query.filters {
            let Some((table, column)) = filter.column_ref() else {
                errors.push(format!("Filter field must be table.column: {}", filter.field));
                continue;
            };
            match self.registry.lookup(table) {
                None => errors.push(format!("Table not found in filter: {}", table)),
                Some(schema) if !schema.has_column(column) => {
                    errors.push(format!("Field not found in filter: {}.{}", table, column))
                }
                Some(_) => {}
            }
        }
    }

    fn check_joins(&self, query: &QueryDescription, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        if query.joins.is_empty() {
            return;
        }

        let mut join_tables: Vec<&str> = Vec::new();
        for join in &query.joins {
            let sides = [
                (join.from_table.as_str(), join.from_column.as_str()),
                (join.to_table.as_str(), join.to_column.as_str()),
            ];
            for (table, column) in sides {
                match self.registry.lookup(table) {
                    None => errors.push(format!("Table not found in join {}: {}", join.id, table)),
                    Some(schema) if !schema.has_column(column) => errors.push(format!(
                        "Field not found in join {}: {}.{}",
                        join.id, table, column
                    )),
                    Some(_) => {}
                }
                join_tables.push(table);
            }

            if !join.join_type.is_supported() {
                errors.push(format!(
                    "Invalid join type in join {}: {}. Valid types: {}",
                    join.id,
                    join.join_type,
                    JoinType::SUPPORTED.join(", ")
                ));
            }
        }

        let missing: Vec<&str> = query
            .selected_tables
            .iter()
            .map(String::as_str)
            .filter(|t| !join_tables.contains(t))
            .collect();
        if !missing.is_empty() {
            warnings.push(format!(
                "Selected tables not covered by any join: {}. The query may fail.",
                missing.join(", ")
            ));
        }
    }

    fn check_junctions(&self, query: &QueryDescription, warnings: &mut Vec<String>) {
        for name in &query.selected_tables {
            let Some(table) = self.registry.lookup(name) else {
                continue;
            };
            let Some(endpoints) = table.junction_for.as_ref().filter(|_| table.is_junction_table) else {
                continue;
            };

            let missing: Vec<&str> = endpoints
                .iter()
                .filter(|e| !query.selected_tables.contains(e))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                warnings.push(format!(
                    "Table '{}' is a junction table connecting {}. Consider also selecting: {}",
                    name,
                    endpoints.join(" and "),
                    missing.join(", ")
                ));
            }
        }
    }

    fn check_order_by(&self, query: &QueryDescription, warnings: &mut Vec<String>) {
        let Some(order_by) = &query.order_by else {
            return;
        };
        let valid = split_column_ref(&order_by.field)
            .is_some_and(|(table, column)| self.registry.is_valid_column(table, column));
        if !valid {
            warnings.push(format!("Invalid order by field {} will be ignored", order_by.field));
        }
    }
}
