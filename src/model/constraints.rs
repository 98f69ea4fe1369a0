//! Installs precedence, station cumulative, shift-overlap operator
//! cumulative, material-release and kind-mutex constraints, in that order.

use std::collections::HashMap;

use crate::calendar::Calendar;
use crate::taskgraph::TaskGraph;
use crate::types::{Order, Station};

use super::vars::TaskVars;
use super::TaskId;

#[derive(Clone, Debug)]
pub enum Constraint {
    Precedence { pred: TaskId, succ: TaskId },
    /// Unit-demand cumulative over every task hosted at `station_id`.
    StationCapacity { station_id: u32, capacity: u32, tasks: Vec<TaskId> },
    /// Operator cumulative over one compressed shift window. A task
    /// contributes `operators` demand only while its interval overlaps
    /// `[comp_start, comp_end)` — the overlap itself is a decision the
    /// solver makes (the reified boolean of spec.md §4.4.3).
    ShiftOperatorCapacity { comp_start: i64, comp_end: i64, capacity: u32, tasks: Vec<TaskId> },
    MaterialRelease { task: TaskId, min_start: i64 },
    /// Disjunctive separation between two same-station, distinct-kind tasks.
    KindMutex { a: TaskId, b: TaskId },
}

pub fn install_precedence(
    task_graph: &TaskGraph,
    id_of: &HashMap<(String, usize), TaskId>,
) -> Vec<Constraint> {
    let mut out = Vec::new();
    for order_ref in task_graph.order_refs() {
        for prec in task_graph.precedence_of(order_ref) {
            let pred = id_of[&(order_ref.to_string(), prec.predecessor)];
            let succ = id_of[&(order_ref.to_string(), prec.successor)];
            out.push(Constraint::Precedence { pred, succ });
        }
    }
    out
}

pub fn install_station_capacity(vars: &[TaskVars], stations: &[Station]) -> Vec<Constraint> {
    let capacity_of: HashMap<u32, u32> = stations.iter().map(|s| (s.id, s.capacity)).collect();

    let mut by_station: HashMap<u32, Vec<TaskId>> = HashMap::new();
    for (idx, var) in vars.iter().enumerate() {
        by_station.entry(var.station_id).or_default().push(TaskId(idx as u32));
    }

    let mut stations_sorted: Vec<u32> = by_station.keys().copied().collect();
    stations_sorted.sort_unstable();

    stations_sorted
        .into_iter()
        .map(|station_id| Constraint::StationCapacity {
            station_id,
            capacity: *capacity_of.get(&station_id).unwrap_or(&1),
            tasks: by_station.remove(&station_id).unwrap(),
        })
        .collect()
}

pub fn install_shift_operator_capacity(calendar: &Calendar, vars: &[TaskVars]) -> Vec<Constraint> {
    let all_tasks: Vec<TaskId> = (0..vars.len() as u32).map(TaskId).collect();

    calendar
        .intervals()
        .iter()
        .map(|interval| Constraint::ShiftOperatorCapacity {
            comp_start: interval.comp_start,
            comp_end: interval.comp_end,
            capacity: interval.capacity,
            tasks: all_tasks.clone(),
        })
        .collect()
}

pub fn install_material_release(
    task_graph: &TaskGraph,
    calendar: &Calendar,
    orders: &[Order],
    id_of: &HashMap<(String, usize), TaskId>,
) -> Vec<Constraint> {
    let ready_dt: HashMap<&str, _> = orders.iter().map(|o| (o.reference.as_str(), o.material_ready_dt)).collect();

    let mut out = Vec::new();
    for order_ref in task_graph.order_refs() {
        let Some(&material_ready_dt) = ready_dt.get(order_ref) else { continue };
        let min_start = calendar.compress(material_ready_dt);

        let has_predecessor: std::collections::HashSet<usize> =
            task_graph.precedence_of(order_ref).iter().map(|p| p.successor).collect();

        for task in task_graph.tasks_of(order_ref) {
            if !has_predecessor.contains(&task.local_index) {
                let id = id_of[&(order_ref.to_string(), task.local_index)];
                out.push(Constraint::MaterialRelease { task: id, min_start });
            }
        }
    }
    out
}

pub fn install_kind_mutex(
    task_graph: &TaskGraph,
    id_of: &HashMap<(String, usize), TaskId>,
) -> Vec<Constraint> {
    let mut by_station: HashMap<u32, Vec<(TaskId, crate::taskgraph::TaskKind)>> = HashMap::new();

    for order_ref in task_graph.order_refs() {
        for task in task_graph.tasks_of(order_ref) {
            let id = id_of[&(order_ref.to_string(), task.local_index)];
            by_station.entry(task.station_id).or_default().push((id, task.kind));
        }
    }

    let mut out = Vec::new();
    let mut station_ids: Vec<u32> = by_station.keys().copied().collect();
    station_ids.sort_unstable();

    for station_id in station_ids {
        let entries = &by_station[&station_id];
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let (a, kind_a) = entries[i];
                let (b, kind_b) = entries[j];
                if !std::mem::discriminant(&kind_a).eq(&std::mem::discriminant(&kind_b)) {
                    out.push(Constraint::KindMutex { a, b });
                }
            }
        }
    }
    out
}
