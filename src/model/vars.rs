//! Variable factory: one [`TaskVars`] per task, keyed by `(order_ref,
//! local_index)` in an associative container — no runtime attribute lookup.

use std::collections::HashMap;

use crate::taskgraph::{TaskGraph, TaskKind};

use super::TaskId;

/// Start/end/duration/operator domains for one task, plus the precomputed
/// `duration_table` realising the element relation `duration = D[ops - min_ops]`.
#[derive(Clone, Debug)]
pub struct TaskVars {
    pub order_ref: String,
    pub local_index: usize,
    pub station_id: u32,
    pub kind: TaskKind,
    pub base_minutes: i64,
    pub min_ops: u32,
    pub max_ops: u32,
    pub start_bounds: (i64, i64),
    pub end_bounds: (i64, i64),
    /// `duration_table[k]` is the duration when `operators == min_ops + k`.
    pub duration_table: Vec<i64>,
}

impl TaskVars {
    pub fn duration_for(&self, operators: u32) -> i64 {
        let idx = (operators - self.min_ops) as usize;
        self.duration_table[idx]
    }

    pub fn duration_bounds(&self) -> (i64, i64) {
        let min = *self.duration_table.iter().min().unwrap();
        let max = *self.duration_table.iter().max().unwrap();
        (min, max)
    }
}

fn duration_table(base_minutes: i64, min_ops: u32, max_ops: u32) -> Vec<i64> {
    if min_ops == max_ops {
        return vec![base_minutes];
    }

    (min_ops..=max_ops)
        .map(|x| if base_minutes > 0 { base_minutes.div_ceil(x as i64) } else { 0 })
        .collect()
}

pub fn build_task_vars(task_graph: &TaskGraph) -> (Vec<TaskVars>, HashMap<(String, usize), TaskId>, i64) {
    let mut horizon = 0i64;
    for order_ref in task_graph.order_refs() {
        for task in task_graph.tasks_of(order_ref) {
            horizon += task.base_minutes.max(1);
        }
    }
    horizon = horizon.max(1);

    let mut vars = Vec::with_capacity(task_graph.total_task_count());
    let mut id_of = HashMap::new();

    let mut order_refs: Vec<&str> = task_graph.order_refs().collect();
    order_refs.sort_unstable();

    for order_ref in order_refs {
        for task in task_graph.tasks_of(order_ref) {
            let table = duration_table(task.base_minutes, task.min_ops, task.max_ops);
            let id = TaskId(vars.len() as u32);
            id_of.insert((task.order_ref.clone(), task.local_index), id);
            vars.push(TaskVars {
                order_ref: task.order_ref.clone(),
                local_index: task.local_index,
                station_id: task.station_id,
                kind: task.kind,
                base_minutes: task.base_minutes,
                min_ops: task.min_ops,
                max_ops: task.max_ops,
                start_bounds: (0, horizon),
                end_bounds: (0, horizon),
                duration_table: table,
            });
        }
    }

    (vars, id_of, horizon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_table_matches_ceiling_division() {
        let table = duration_table(120, 1, 2);
        assert_eq!(table, vec![120, 60]);
    }

    #[test]
    fn constant_table_for_fixed_operator_count() {
        let table = duration_table(45, 0, 0);
        assert_eq!(table, vec![45]);
    }
}
