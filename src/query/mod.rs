//! The query pipeline: validate, resolve joins, check connectivity, order
//! joins, build SQL. Each stage takes its input by reference and returns a
//! new value.

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    errors::QueryError,
    models::query::{
        AutoJoinRequest, AutoJoinResponse, JoinSpec, QueryDescription, ValidationOutcome, ValidationReport,
    },
    registry::SchemaRegistry,
};

pub mod builder;
pub mod orderer;
pub mod resolver;
pub mod validator;

use builder::{CompiledQuery, SqlBuilder};
use orderer::{order_joins, select_primary_table};
use resolver::{check_connectivity, find_connected_components, optimize_joins, JoinResolver};
use validator::QueryValidator;

/// A validated query whose joins are complete and ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    /// The client's description with the final (possibly synthesized) join set.
    pub query: QueryDescription,
    pub primary_table: String,
    /// Joins in execution order.
    pub joins: Vec<JoinSpec>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QueryEngine {
    registry: Arc<SchemaRegistry>,
}

impl QueryEngine {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn validate(&self, query: &QueryDescription) -> ValidationReport {
        QueryValidator::new(&self.registry).validate(query)
    }

    /// Validation report plus the joins resolution would add and the
    /// connectivity of the declared joins.
    pub fn validate_with_suggestions(&self, query: &QueryDescription) -> ValidationOutcome {
        let report = self.validate(query);
        let connectivity = check_connectivity(&query.selected_tables, &query.joins);
        let resolver = JoinResolver::new(&self.registry);

        let suggested_joins = if query.joins.is_empty() {
            resolver.generate_automatic_joins(&query.selected_tables)
        } else if !connectivity.is_connected {
            resolver.complete_joins(&completion_order(query), &query.joins)
        } else {
            Vec::new()
        };

        ValidationOutcome {
            report,
            suggested_joins,
            connectivity,
        }
    }

    /// The declared joins, completed with synthesized ones when tables are left unconnected.
    pub fn resolve_joins(&self, query: &QueryDescription) -> Vec<JoinSpec> {
        let resolver = JoinResolver::new(&self.registry);

        if query.joins.is_empty() {
            let joins = resolver.generate_automatic_joins(&query.selected_tables);
            debug!("Generated {} automatic joins", joins.len());
            return joins;
        }

        let connectivity = check_connectivity(&query.selected_tables, &query.joins);
        if connectivity.is_connected {
            return query.joins.clone();
        }

        debug!(
            "Connecting tables left out by declared joins: {}",
            connectivity.disconnected_tables.join(", ")
        );
        let mut joins = query.joins.clone();
        joins.extend(resolver.complete_joins(&completion_order(query), &query.joins));
        joins
    }

    pub fn plan(&self, query: &QueryDescription) -> Result<PlannedQuery, QueryError> {
        let report = QueryValidator::new(&self.registry).validate_structure(query);
        if !report.is_valid {
            return Err(QueryError::Validation {
                errors: report.errors,
                warnings: report.warnings,
            });
        }
        for warning in &report.warnings {
            warn!("{}", warning);
        }

        let joins = self.resolve_joins(query);

        let mut scope: Vec<String> = Vec::new();
        let join_tables = joins.iter().flat_map(|j| [&j.from_table, &j.to_table]);
        for table in query.selected_tables.iter().chain(join_tables) {
            if !scope.contains(table) {
                scope.push(table.clone());
            }
        }
        let groups = find_connected_components(&scope, &joins);
        if groups.len() > 1 {
            return Err(QueryError::Connectivity { groups });
        }

        // Synthesized joins only point away from the table completion started at.
        let synthesized = joins.len() > query.joins.len();
        let primary_table = if synthesized {
            completion_order(query).into_iter().next()
        } else {
            select_primary_table(&query.selected_tables, &joins)
        }
        .ok_or_else(|| QueryError::Schema("No table selected".to_string()))?;
        let ordered = order_joins(&primary_table, &joins)?;

        Ok(PlannedQuery {
            query: query.with_joins(joins),
            primary_table,
            joins: ordered,
            warnings: report.warnings,
        })
    }

    pub fn compile(&self, query: &QueryDescription) -> Result<(PlannedQuery, CompiledQuery), QueryError> {
        let plan = self.plan(query)?;
        let compiled = SqlBuilder::new(&self.registry).build(&plan);
        debug!("SQL: {} {:?}", compiled.sql, compiled.parameters);
        Ok((plan, compiled))
    }

    /// Joins for a table being added to an existing selection, plus the
    /// whole join set with redundant joins removed.
    pub fn auto_joins(&self, request: &AutoJoinRequest) -> Result<AutoJoinResponse, QueryError> {
        if self.registry.lookup(&request.new_table).is_none() {
            return Err(QueryError::Schema(format!(
                "Table '{}' does not exist in the schema",
                request.new_table
            )));
        }

        let new_joins = JoinResolver::new(&self.registry).joins_for_new_table(
            &request.new_table,
            &request.existing_tables,
            &request.existing_joins,
        );

        let mut all_joins = request.existing_joins.clone();
        all_joins.extend(new_joins.iter().cloned());
        let optimized_joins = optimize_joins(&all_joins);

        let message = if new_joins.is_empty() {
            format!(
                "Table '{}' is already connected or has no relation to the existing tables",
                request.new_table
            )
        } else {
            format!(
                "Generated automatic joins connecting '{}' to the existing tables",
                request.new_table
            )
        };

        Ok(AutoJoinResponse {
            new_joins,
            optimized_joins,
            message,
        })
    }
}

/// Selected tables with the root of the declared joins moved to the front.
/// Join completion grows from the first table of this list.
fn completion_order(query: &QueryDescription) -> Vec<String> {
    let Some(seed) = select_primary_table(&query.selected_tables, &query.joins) else {
        return Vec::new();
    };

    let mut tables = vec![seed.clone()];
    tables.extend(query.selected_tables.iter().filter(|t| **t != seed).cloned());
    tables
}
