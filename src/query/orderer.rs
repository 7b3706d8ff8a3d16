use crate::{errors::QueryError, models::query::JoinSpec};

/// Picks the table for the FROM clause.
///
/// Prefers a join source that is never a join target, then the source of the
/// first join; either must be a selected table. Falls back to the first
/// selected table.
pub fn select_primary_table(selected_tables: &[String], joins: &[JoinSpec]) -> Option<String> {
    let is_selected = |table: &str| selected_tables.iter().any(|t| t == table);

    let root = joins
        .iter()
        .map(|j| j.from_table.as_str())
        .find(|from| !joins.iter().any(|j| j.to_table == *from));

    let candidate = match root {
        Some(root) if is_selected(root) => Some(root),
        _ => joins
            .first()
            .map(|j| j.from_table.as_str())
            .filter(|from| is_selected(*from)),
    };

    candidate
        .map(str::to_string)
        .or_else(|| selected_tables.first().cloned())
}

/// Orders `joins` so each one only references tables already in scope,
/// starting from `primary_table`.
pub fn order_joins(primary_table: &str, joins: &[JoinSpec]) -> Result<Vec<JoinSpec>, QueryError> {
    let mut ordered = Vec::with_capacity(joins.len());
    let mut pending: Vec<JoinSpec> = joins.to_vec();
    let mut present = vec![primary_table.to_string()];

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|join| present.contains(&join.from_table));

        let Some(idx) = ready else {
            let mut missing: Vec<String> = Vec::new();
            for join in &pending {
                if !missing.contains(&join.from_table) {
                    missing.push(join.from_table.clone());
                }
            }
            return Err(QueryError::UnorderableJoins {
                failed: pending,
                available: present,
                missing,
            });
        };

        let join = pending.remove(idx);
        if !present.contains(&join.to_table) {
            present.push(join.to_table.clone());
        }
        ordered.push(join);
    }

    Ok(ordered)
}
