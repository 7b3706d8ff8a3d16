//! Relationship graph resolution.
//!
//! Connectivity of the selected tables is judged over the joins a query
//! carries; missing joins are synthesized from the schema's relations, either
//! directly or through intermediate tables.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};

use crate::{
    models::query::{Connectivity, JoinSpec, JoinType},
    registry::SchemaRegistry,
};

/// Undirected adjacency over `tables`, using only joins whose endpoints are both in `tables`.
fn adjacency<'a>(tables: &'a [String], joins: &'a [JoinSpec]) -> HashMap<&'a str, Vec<&'a str>> {
    let mut graph: HashMap<&str, Vec<&str>> =
        tables.iter().map(|t| (t.as_str(), Vec::new())).collect();

    for join in joins {
        let (from, to) = (join.from_table.as_str(), join.to_table.as_str());
        if !graph.contains_key(from) || !graph.contains_key(to) {
            continue;
        }
        for (a, b) in [(from, to), (to, from)] {
            if let Some(neighbors) = graph.get_mut(a) {
                if !neighbors.contains(&b) {
                    neighbors.push(b);
                }
            }
        }
    }

    graph
}

/// Partitions `tables` into groups connected through `joins`.
pub fn find_connected_components(tables: &[String], joins: &[JoinSpec]) -> Vec<Vec<String>> {
    let graph = adjacency(tables, joins);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();

    for table in tables {
        if visited.contains(table.as_str()) {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![table.as_str()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            component.push(current.to_string());
            if let Some(neighbors) = graph.get(current) {
                stack.extend(neighbors.iter().copied());
            }
        }
        components.push(component);
    }

    components
}

/// Breadth-first reachability from the first selected table.
pub fn check_connectivity(tables: &[String], joins: &[JoinSpec]) -> Connectivity {
    let Some(first) = tables.first() else {
        return Connectivity {
            is_connected: true,
            disconnected_tables: Vec::new(),
        };
    };

    let graph = adjacency(tables, joins);
    let mut visited: HashSet<&str> = HashSet::from([first.as_str()]);
    let mut queue = VecDeque::from([first.as_str()]);

    while let Some(current) = queue.pop_front() {
        for &neighbor in graph.get(current).into_iter().flatten() {
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    let disconnected_tables: Vec<String> = tables
        .iter()
        .filter(|t| !visited.contains(t.as_str()))
        .cloned()
        .collect();

    Connectivity {
        is_connected: disconnected_tables.is_empty(),
        disconnected_tables,
    }
}

/// Drops joins whose endpoints stay connected through the remaining joins.
///
/// Later joins are considered first, so joins a caller already had survive
/// over ones appended after them. The result contains no redundant edge.
pub fn optimize_joins(joins: &[JoinSpec]) -> Vec<JoinSpec> {
    let mut keep = vec![true; joins.len()];

    for idx in (0..joins.len()).rev() {
        if has_alternative_path(joins, &keep, idx) {
            debug!("Dropping redundant join {}", joins[idx].id);
            keep[idx] = false;
        }
    }

    joins
        .iter()
        .zip(keep)
        .filter_map(|(join, kept)| kept.then(|| join.clone()))
        .collect()
}

fn has_alternative_path(joins: &[JoinSpec], keep: &[bool], excluded: usize) -> bool {
    let start = joins[excluded].from_table.as_str();
    let target = joins[excluded].to_table.as_str();
    if start == target {
        return true;
    }

    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        let edges = joins
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != excluded && keep[*idx]);
        for (_, join) in edges {
            let neighbor = if join.from_table == current {
                join.to_table.as_str()
            } else if join.to_table == current {
                join.from_table.as_str()
            } else {
                continue;
            };
            if neighbor == target {
                return true;
            }
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    false
}

/// Synthesizes joins from the schema's declared relations.
pub struct JoinResolver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> JoinResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Shortest chain of tables from `from` to `to`, where each step follows a
    /// relation declared in either direction and only visits `universe`.
    pub fn find_path(&self, from: &str, to: &str, universe: &[&str]) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::from([from]);
        let mut queue = VecDeque::from([vec![from]]);

        while let Some(path) = queue.pop_front() {
            let current = path[path.len() - 1];
            if current == to {
                return Some(path.iter().map(|t| t.to_string()).collect());
            }

            for &table in universe {
                if visited.contains(table) || self.registry.relation_between(current, table).is_none() {
                    continue;
                }
                visited.insert(table);
                let mut next = path.clone();
                next.push(table);
                queue.push_back(next);
            }
        }

        None
    }

    /// LEFT joins connecting every table to the first one, in selection order.
    pub fn generate_automatic_joins(&self, tables: &[String]) -> Vec<JoinSpec> {
        self.complete_joins(tables, &[])
    }

    /// Joins to add to `existing` so that every table in `tables` hangs off
    /// the group that contains the first table. Only the new joins are returned.
    pub fn complete_joins(&self, tables: &[String], existing: &[JoinSpec]) -> Vec<JoinSpec> {
        let Some(first) = tables.first() else {
            return Vec::new();
        };

        let mut state = Completion {
            connected: Vec::new(),
            joins: existing.to_vec(),
            existing,
        };
        state.absorb(first);

        for table in &tables[1..] {
            if state.is_connected(table) {
                continue;
            }
            if self.connect_directly(&mut state, table) || self.connect_through_path(&mut state, table) {
                state.absorb(table);
            } else {
                warn!("No relation path connects table {}", table);
            }
        }

        state.joins.split_off(existing.len())
    }

    /// Joins that attach `new_table` to a query that already has
    /// `existing_tables` and `existing_joins`: one direct relation if any
    /// existing table has one, otherwise every missing hop of the first path found.
    pub fn joins_for_new_table(
        &self,
        new_table: &str,
        existing_tables: &[String],
        existing_joins: &[JoinSpec],
    ) -> Vec<JoinSpec> {
        let already_joined = existing_joins
            .iter()
            .any(|j| j.from_table == new_table || j.to_table == new_table);
        if existing_tables.is_empty() || already_joined {
            return Vec::new();
        }

        for existing in existing_tables {
            if let Some(pair) = self.registry.relation_between(existing, new_table) {
                return vec![JoinSpec::new(
                    existing,
                    &pair.from_field,
                    new_table,
                    &pair.to_field,
                    JoinType::Left,
                )];
            }
        }

        let universe = self.registry.table_names();
        let Some(path) = existing_tables
            .iter()
            .find_map(|existing| self.find_path(existing, new_table, &universe))
        else {
            return Vec::new();
        };

        let mut joins: Vec<JoinSpec> = Vec::new();
        for hop in path.windows(2) {
            let (current, next) = (hop[0].as_str(), hop[1].as_str());
            let joined = existing_joins.iter().chain(joins.iter()).any(|j| j.connects(current, next));
            if joined {
                continue;
            }
            if let Some(pair) = self.registry.relation_between(current, next) {
                joins.push(JoinSpec::new(current, &pair.from_field, next, &pair.to_field, JoinType::Left));
            }
        }
        joins
    }

    fn connect_directly(&self, state: &mut Completion<'_>, table: &str) -> bool {
        let found = state.connected.iter().find_map(|connected| {
            self.registry
                .relation_between(connected, table)
                .map(|pair| JoinSpec::new(connected, &pair.from_field, table, &pair.to_field, JoinType::Left))
        });

        match found {
            Some(join) => {
                debug!("Auto-join {} -> {}", join.from_table, join.to_table);
                state.joins.push(join);
                true
            }
            None => false,
        }
    }

    fn connect_through_path(&self, state: &mut Completion<'_>, table: &str) -> bool {
        let universe = self.registry.table_names();
        let path = state
            .connected
            .iter()
            .find_map(|connected| self.find_path(connected, table, &universe));

        let Some(path) = path else {
            return false;
        };

        debug!("Auto-join path {}", path.join(" -> "));
        for hop in path.windows(2) {
            let (current, next) = (hop[0].as_str(), hop[1].as_str());
            if !state.joins.iter().any(|j| j.connects(current, next)) {
                if let Some(pair) = self.registry.relation_between(current, next) {
                    state
                        .joins
                        .push(JoinSpec::new(current, &pair.from_field, next, &pair.to_field, JoinType::Left));
                }
            }
            state.absorb(next);
        }
        true
    }
}

struct Completion<'e> {
    connected: Vec<String>,
    joins: Vec<JoinSpec>,
    existing: &'e [JoinSpec],
}

impl Completion<'_> {
    fn is_connected(&self, table: &str) -> bool {
        self.connected.iter().any(|t| t == table)
    }

    /// Marks `table` connected together with everything the caller's joins reach from it.
    fn absorb(&mut self, table: &str) {
        let mut queue = VecDeque::from([table.to_string()]);
        while let Some(current) = queue.pop_front() {
            if self.is_connected(&current) {
                continue;
            }
            for join in self.existing {
                if join.from_table == current {
                    queue.push_back(join.to_table.clone());
                } else if join.to_table == current {
                    queue.push_back(join.from_table.clone());
                }
            }
            self.connected.push(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn join(from: &str, to: &str) -> JoinSpec {
        JoinSpec::new(from, "id", to, "id", JoinType::Inner)
    }

    #[test]
    fn test_components_split_disjoint_groups() {
        let selected = tables(&["users", "questions", "tags", "question_tags"]);
        let joins = vec![join("users", "questions"), join("tags", "question_tags")];

        let components = find_connected_components(&selected, &joins);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0], tables(&["users", "questions"]));
        assert_eq!(components[1], tables(&["tags", "question_tags"]));
    }

    #[test]
    fn test_components_ignore_joins_leaving_selection() {
        let selected = tables(&["users", "tags"]);
        let joins = vec![join("users", "questions"), join("questions", "tags")];

        assert_eq!(find_connected_components(&selected, &joins).len(), 2);
    }

    #[test]
    fn test_connectivity_reports_unreached_tables() {
        let selected = tables(&["users", "questions", "tags"]);
        let connectivity = check_connectivity(&selected, &[join("questions", "users")]);

        assert!(!connectivity.is_connected);
        assert_eq!(connectivity.disconnected_tables, tables(&["tags"]));
        assert!(check_connectivity(&tables(&["users"]), &[]).is_connected);
    }

    #[test]
    fn test_optimize_keeps_earlier_joins_in_a_cycle() {
        let joins = vec![
            join("users", "questions"),
            join("questions", "answers"),
            join("users", "answers"),
        ];

        let optimized = optimize_joins(&joins);
        assert_eq!(optimized, joins[..2].to_vec());
    }

    #[test]
    fn test_optimize_removes_duplicate_edges() {
        let joins = vec![join("users", "questions"), join("questions", "users")];

        assert_eq!(optimize_joins(&joins), vec![join("users", "questions")]);
    }

    #[test]
    fn test_complete_joins_absorbs_existing_groups() {
        let registry = SchemaRegistry::stackoverflow().unwrap();
        let resolver = JoinResolver::new(&registry);
        let selected = tables(&["users", "question_tags", "tags"]);
        let existing = vec![join("question_tags", "tags")];

        let added = resolver.complete_joins(&selected, &existing);
        assert_eq!(added.len(), 2);
        assert_eq!((added[0].from_table.as_str(), added[0].to_table.as_str()), ("users", "questions"));
        assert_eq!(
            (added[1].from_table.as_str(), added[1].to_table.as_str()),
            ("questions", "question_tags")
        );
    }
}
