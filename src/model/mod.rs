//! The constraint-programming model: variables, constraints and objective
//! over the dense compressed-time axis built by [`crate::calendar`].
//!
//! Nothing in this module invokes a solver; [`build_model`] only
//! materialises the model. Search is delegated to a
//! [`crate::solver::SolverBackend`].

pub mod constraints;
pub mod objective;
pub mod vars;

use std::collections::HashMap;

use crate::calendar::Calendar;
use crate::taskgraph::TaskGraph;
use crate::types::{Order, Station};

pub use constraints::Constraint;
pub use objective::Objective;
pub use vars::TaskVars;

/// Dense index into [`CpModel::vars`]. Stable for the lifetime of one model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

pub struct CpModel {
    pub horizon: i64,
    pub vars: Vec<TaskVars>,
    pub id_of: HashMap<(String, usize), TaskId>,
    pub constraints: Vec<Constraint>,
    pub objective: Objective,
}

impl CpModel {
    pub fn task(&self, id: TaskId) -> &TaskVars {
        &self.vars[id.0 as usize]
    }

    pub fn id_for(&self, order_ref: &str, local_index: usize) -> Option<TaskId> {
        self.id_of.get(&(order_ref.to_string(), local_index)).copied()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> {
        (0..self.vars.len() as u32).map(TaskId)
    }
}

/// Builds the full model (variables, all five constraint families in
/// installation order, and the tardiness/makespan objective) from a built
/// calendar, task graph, and the order/station catalogues.
pub fn build_model(
    calendar: &Calendar,
    task_graph: &TaskGraph,
    orders: &[Order],
    stations: &[Station],
) -> CpModel {
    let (vars, id_of, horizon) = vars::build_task_vars(task_graph);

    let mut constraints = Vec::new();
    constraints.extend(constraints::install_precedence(task_graph, &id_of));
    constraints.extend(constraints::install_station_capacity(&vars, stations));
    constraints.extend(constraints::install_shift_operator_capacity(calendar, &vars));
    constraints.extend(constraints::install_material_release(task_graph, calendar, orders, &id_of));
    constraints.extend(constraints::install_kind_mutex(task_graph, &id_of));

    let objective = objective::build_objective(task_graph, calendar, orders, &id_of);

    CpModel { horizon, vars, id_of, constraints, objective }
}
