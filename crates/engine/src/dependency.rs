//! Dependency ordering for batches of tables and records.
//!
//! Both sorts are Kahn's algorithm over edges pointing from a dependency to
//! its dependent, seeded in input order, so inputs without references keep
//! their order. A cycle cannot be ordered; the sorts then log a warning and
//! return the input order unchanged.

use std::collections::{HashMap, HashSet, VecDeque};

use tablekit_sdk::{
    domain::{record::RecordInput, table::Table},
    ids::{RecordId, TableId},
};
use tracing::warn;

/// Consecutive records of one table, in insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordGroup {
    pub table_id: TableId,
    pub records: Vec<RecordInput>,
}

/// Orders `tables` so that every table comes after the batch tables its
/// link fields point at. Self references and tables outside the batch are
/// ignored.
pub fn sort_tables(tables: Vec<Table>) -> Vec<Table> {
    let positions: HashMap<&TableId, usize> = tables
        .iter()
        .enumerate()
        .map(|(index, table)| (table.id(), index))
        .collect();

    let mut edges = Vec::new();
    for (dependent, table) in tables.iter().enumerate() {
        for foreign in table.foreign_table_refs() {
            if let Some(&dependency) = positions.get(&foreign.table_id)
                && dependency != dependent
            {
                edges.push((dependency, dependent));
            }
        }
    }

    let Some(order) = kahn(tables.len(), &edges) else {
        warn!(
            tables = tables.len(),
            "tables reference each other in a cycle, keeping input order"
        );
        return tables;
    };

    let mut slots: Vec<Option<Table>> = tables.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

/// Orders records so that every record is inserted after the batch records
/// its link cells point at, then groups consecutive records of one table.
///
/// Records without an id cannot be referenced and never gain dependents.
pub fn sort_records(batches: Vec<(TableId, Vec<RecordInput>)>) -> Vec<RecordGroup> {
    let nodes: Vec<(TableId, RecordInput)> = batches
        .into_iter()
        .flat_map(|(table_id, records)| {
            records
                .into_iter()
                .map(move |record| (table_id.clone(), record))
        })
        .collect();

    let positions: HashMap<&RecordId, usize> = nodes
        .iter()
        .enumerate()
        .filter_map(|(index, (_, record))| record.id.as_ref().map(|id| (id, index)))
        .collect();

    let mut edges = Vec::new();
    for (dependent, (_, record)) in nodes.iter().enumerate() {
        for linked in record.linked_record_ids() {
            if let Some(&dependency) = positions.get(&linked)
                && dependency != dependent
            {
                edges.push((dependency, dependent));
            }
        }
    }

    let order = kahn(nodes.len(), &edges).unwrap_or_else(|| {
        warn!(
            records = nodes.len(),
            "records link to each other in a cycle, keeping input order"
        );
        (0..nodes.len()).collect()
    });

    let mut slots: Vec<Option<(TableId, RecordInput)>> = nodes.into_iter().map(Some).collect();
    let mut groups: Vec<RecordGroup> = Vec::new();
    for index in order {
        let Some((table_id, record)) = slots[index].take() else {
            continue;
        };
        match groups.last_mut() {
            Some(group) if group.table_id == table_id => group.records.push(record),
            _ => groups.push(RecordGroup {
                table_id,
                records: vec![record],
            }),
        }
    }
    groups
}

/// Returns a topological order of `0..len`, or `None` when `edges` contain a
/// cycle. Each edge is `(dependency, dependent)`.
fn kahn(len: usize, edges: &[(usize, usize)]) -> Option<Vec<usize>> {
    let mut seen = HashSet::new();
    let mut dependents = vec![Vec::new(); len];
    let mut in_degree = vec![0usize; len];
    for &(dependency, dependent) in edges {
        if seen.insert((dependency, dependent)) {
            dependents[dependency].push(dependent);
            in_degree[dependent] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..len).filter(|&index| in_degree[index] == 0).collect();
    let mut order = Vec::with_capacity(len);
    while let Some(index) = queue.pop_front() {
        order.push(index);
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    (order.len() == len).then_some(order)
}
