//! Builds per-order task sequences and intra-order precedence graphs from
//! raw task records.

use std::collections::{HashMap, HashSet};

use crate::error::PlannerError;
use crate::types::{Order, Station};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Operative,
    Verification,
}

/// A single row of the TASKS table, before normalisation.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct RawTask {
    pub parent_material: String,
    pub internal_id: i64,
    #[serde(default)]
    pub predecessors: String,
    pub station_id: u32,
    #[allow(dead_code)]
    pub station_name: String,
    pub kind: RawTaskKind,
    #[allow(dead_code)]
    pub description: String,
    pub hours_operator: f64,
    pub hours_verification: f64,
    pub operators_max: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum RawTaskKind {
    #[serde(rename = "OPERATIVE")]
    Operative,
    #[serde(rename = "VERIFICATION")]
    Verification,
}

/// A normalised task: operator bounds and base duration resolved by kind,
/// position within its order fixed as `local_index`.
#[derive(Clone, Debug)]
pub struct Task {
    pub order_ref: String,
    pub local_index: usize,
    pub task_id: i64,
    pub station_id: u32,
    pub base_minutes: i64,
    pub min_ops: u32,
    pub max_ops: u32,
    pub kind: TaskKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Precedence {
    pub predecessor: usize,
    pub successor: usize,
}

#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    /// Tasks grouped per order, in input order (`tasks[order][i].local_index == i`).
    pub tasks: HashMap<String, Vec<Task>>,
    pub precedence: HashMap<String, Vec<Precedence>>,
}

impl TaskGraph {
    pub fn order_refs(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn tasks_of(&self, order_ref: &str) -> &[Task] {
        self.tasks.get(order_ref).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn precedence_of(&self, order_ref: &str) -> &[Precedence] {
        self.precedence.get(order_ref).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_task_count(&self) -> usize {
        self.tasks.values().map(Vec::len).sum()
    }
}

fn ceil_minutes(hours: f64) -> i64 {
    (hours * 60.0).ceil() as i64
}

pub fn build_task_graph(
    orders: &[Order],
    raw_tasks: &[RawTask],
    stations: &[Station],
) -> Result<TaskGraph, PlannerError> {
    let known_orders: HashSet<&str> = orders.iter().map(|o| o.reference.as_str()).collect();
    let known_stations: HashSet<u32> = stations.iter().map(|s| s.id).collect();

    let mut grouped: HashMap<String, Vec<&RawTask>> = HashMap::new();
    for raw in raw_tasks {
        if known_orders.contains(raw.parent_material.as_str()) {
            grouped.entry(raw.parent_material.clone()).or_default().push(raw);
        }
    }

    let mut tasks: HashMap<String, Vec<Task>> = HashMap::new();
    let mut precedence: HashMap<String, Vec<Precedence>> = HashMap::new();

    for (order_ref, raws) in &grouped {
        let mut id_to_local: HashMap<i64, usize> = HashMap::new();
        for (local_index, raw) in raws.iter().enumerate() {
            if id_to_local.insert(raw.internal_id, local_index).is_some() {
                return Err(PlannerError::invalid_input(format!(
                    "duplicate internal_id {} for order {order_ref}",
                    raw.internal_id
                )));
            }
        }

        let mut normalised = Vec::with_capacity(raws.len());
        for (local_index, raw) in raws.iter().enumerate() {
            if !known_stations.contains(&raw.station_id) {
                return Err(PlannerError::invalid_input(format!(
                    "task {} of order {order_ref} references unknown station {}",
                    raw.internal_id, raw.station_id
                )));
            }

            let (kind, base_minutes, min_ops, max_ops) = match raw.kind {
                RawTaskKind::Operative => {
                    if raw.operators_max < 1 {
                        return Err(PlannerError::invalid_input(format!(
                            "operative task {} of order {order_ref} has operators_max < 1",
                            raw.internal_id
                        )));
                    }
                    (TaskKind::Operative, ceil_minutes(raw.hours_operator), 1, raw.operators_max)
                }
                RawTaskKind::Verification => {
                    (TaskKind::Verification, ceil_minutes(raw.hours_verification), 0, 0)
                }
            };

            normalised.push(Task {
                order_ref: order_ref.clone(),
                local_index,
                task_id: raw.internal_id,
                station_id: raw.station_id,
                base_minutes,
                min_ops,
                max_ops,
                kind,
            });
        }

        let mut prec_list = Vec::new();
        for (local_index, raw) in raws.iter().enumerate() {
            let preds = raw.predecessors.trim();
            if preds.is_empty() {
                continue;
            }
            for piece in preds.split(';') {
                let piece = piece.trim();
                if piece.is_empty() {
                    continue;
                }
                let pred_id: i64 = piece.parse().map_err(|_| {
                    PlannerError::invalid_input(format!(
                        "malformed predecessor id '{piece}' for task {} of order {order_ref}",
                        raw.internal_id
                    ))
                })?;
                let pred_local = id_to_local.get(&pred_id).copied().ok_or_else(|| {
                    PlannerError::invalid_input(format!(
                        "task {} of order {order_ref} references unknown predecessor {pred_id}",
                        raw.internal_id
                    ))
                })?;
                prec_list.push(Precedence { predecessor: pred_local, successor: local_index });
            }
        }

        assert_acyclic(order_ref, normalised.len(), &prec_list)?;

        tasks.insert(order_ref.clone(), normalised);
        precedence.insert(order_ref.clone(), prec_list);
    }

    Ok(TaskGraph { tasks, precedence })
}

fn assert_acyclic(order_ref: &str, n: usize, precedence: &[Precedence]) -> Result<(), PlannerError> {
    let mut adjacency = vec![Vec::new(); n];
    for p in precedence {
        adjacency[p.predecessor].push(p.successor);
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; n];

    fn visit(
        node: usize,
        adjacency: &[Vec<usize>],
        marks: &mut [Mark],
        order_ref: &str,
    ) -> Result<(), PlannerError> {
        match marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(PlannerError::invalid_input(format!(
                    "cyclic precedence detected within order {order_ref}"
                )))
            }
            Mark::Unvisited => {}
        }

        marks[node] = Mark::InProgress;
        for &next in &adjacency[node] {
            visit(next, adjacency, marks, order_ref)?;
        }
        marks[node] = Mark::Done;
        Ok(())
    }

    for node in 0..n {
        visit(node, &adjacency, &mut marks, order_ref)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn order(reference: &str) -> Order {
        let dt: NaiveDateTime = "2025-03-10T00:00:00".parse().unwrap();
        Order { reference: reference.to_string(), due_dt: dt, material_ready_dt: dt }
    }

    fn station(id: u32) -> Station {
        Station { id, name: format!("st{id}"), capacity: 1 }
    }

    fn raw(parent: &str, id: i64, preds: &str, station_id: u32) -> RawTask {
        RawTask {
            parent_material: parent.to_string(),
            internal_id: id,
            predecessors: preds.to_string(),
            station_id,
            station_name: String::new(),
            kind: RawTaskKind::Operative,
            description: String::new(),
            hours_operator: 1.0,
            hours_verification: 0.0,
            operators_max: 1,
        }
    }

    #[test]
    fn resolves_predecessors_to_local_indices() {
        let graph = build_task_graph(
            &[order("A")],
            &[raw("A", 10, "", 1), raw("A", 20, "10", 1)],
            &[station(1)],
        )
        .unwrap();

        let prec = graph.precedence_of("A");
        assert_eq!(prec, &[Precedence { predecessor: 0, successor: 1 }]);
    }

    #[test]
    fn discards_tasks_of_unknown_orders() {
        let graph = build_task_graph(&[order("A")], &[raw("A", 1, "", 1), raw("B", 2, "", 1)], &[station(1)]).unwrap();
        assert_eq!(graph.total_task_count(), 1);
        assert!(graph.tasks_of("B").is_empty());
    }

    #[test]
    fn rejects_cycles() {
        let err = build_task_graph(
            &[order("A")],
            &[raw("A", 1, "2", 1), raw("A", 2, "1", 1)],
            &[station(1)],
        )
        .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));
    }

    #[test]
    fn rejects_unknown_station() {
        let err = build_task_graph(&[order("A")], &[raw("A", 1, "", 99)], &[station(1)]).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidInput(_)));
    }

    #[test]
    fn verification_task_has_zero_operator_bounds() {
        let mut r = raw("A", 1, "", 1);
        r.kind = RawTaskKind::Verification;
        r.hours_verification = 2.0;
        r.operators_max = 0;
        let graph = build_task_graph(&[order("A")], &[r], &[station(1)]).unwrap();
        let t = &graph.tasks_of("A")[0];
        assert_eq!((t.min_ops, t.max_ops, t.base_minutes), (0, 0, 120));
        assert!(matches!(t.kind, TaskKind::Verification));
    }
}
