//! Per-order completion, weighted tardiness, makespan, and the combined
//! lexicographic-weighted objective.

use std::collections::{HashMap, HashSet};

use crate::calendar::Calendar;
use crate::taskgraph::TaskGraph;
use crate::types::Order;

use super::TaskId;

#[derive(Clone, Debug)]
pub struct OrderObjective {
    pub order_ref: String,
    pub due_min: i64,
    pub weight: i64,
    /// Tasks whose end marks the order's completion: tasks with no
    /// successor, falling back to every task of the order if that set is
    /// empty (spec.md §9, preserved both ways).
    pub final_tasks: Vec<TaskId>,
}

#[derive(Clone, Debug)]
pub struct Objective {
    pub orders: Vec<OrderObjective>,
}

impl Objective {
    /// `10 * sum_tardiness + makespan`, given each task's solved end time
    /// and the end time of each order's final-task set (already
    /// max-reduced by the caller). Returns `(sum_tardiness, makespan, combined)`.
    pub fn evaluate(&self, order_ends: &HashMap<&str, i64>, makespan: i64) -> (i64, i64, i64) {
        let sum_tardiness: i64 = self
            .orders
            .iter()
            .map(|o| {
                let end = order_ends.get(o.order_ref.as_str()).copied().unwrap_or(0);
                let tardiness = (end - o.due_min).max(0);
                tardiness * o.weight
            })
            .sum();

        let combined = 10 * sum_tardiness + makespan;
        (sum_tardiness, makespan, combined)
    }
}

pub fn build_objective(
    task_graph: &TaskGraph,
    calendar: &Calendar,
    orders: &[Order],
    id_of: &HashMap<(String, usize), TaskId>,
) -> Objective {
    let calendar_start_day = calendar
        .intervals()
        .first()
        .map(|i| i.real_start.date())
        .unwrap_or_default();

    let mut objectives = Vec::new();

    for order in orders {
        let order_ref = order.reference.as_str();
        let tasks = task_graph.tasks_of(order_ref);
        if tasks.is_empty() {
            continue;
        }

        let has_successor: HashSet<usize> =
            task_graph.precedence_of(order_ref).iter().map(|p| p.predecessor).collect();

        let mut finals: Vec<usize> = (0..tasks.len()).filter(|i| !has_successor.contains(i)).collect();
        if finals.is_empty() {
            finals = (0..tasks.len()).collect();
        }

        let final_tasks = finals
            .into_iter()
            .map(|local_index| id_of[&(order_ref.to_string(), local_index)])
            .collect();

        let due_min = calendar.compress(order.due_dt);
        let days_since_start = (order.due_dt.date() - calendar_start_day).num_days();
        let weight = (1000 - days_since_start).max(1);

        objectives.push(OrderObjective { order_ref: order_ref.to_string(), due_min, weight, final_tasks });
    }

    Objective { orders: objectives }
}
