//! The sequential pipeline: compress the calendar, build the task graph,
//! build the model, solve it, extract the solution. One [`Session`] per run;
//! nothing here survives across solves (spec.md §5's "state belongs to a
//! Session value instantiated per solve").

use crate::calendar::{Calendar, Shift};
use crate::error::PlannerError;
use crate::extract::{self, Solution};
use crate::model;
use crate::solver::engine::ConstraintPropagationSolver;
use crate::solver::{SolverBackend, SolverConfig, SolverOutcome};
use crate::taskgraph::{self, RawTask, TaskGraph};
use crate::types::{Order, Station};

pub struct Session {
    pub orders: Vec<Order>,
    pub shifts: Vec<Shift>,
    pub raw_tasks: Vec<RawTask>,
    pub stations: Vec<Station>,
    pub solver_config: SolverConfig,
}

pub struct SessionOutput {
    pub solution: Solution,
    pub outcome: SolverOutcome,
}

impl Session {
    pub fn run(&self) -> Result<SessionOutput, PlannerError> {
        let calendar_span = tracing::info_span!("compress");
        let calendar = {
            let _guard = calendar_span.enter();
            Calendar::build(&self.shifts)?
        };

        let build_span = tracing::info_span!("build");
        let (task_graph, cp_model) = {
            let _guard = build_span.enter();
            let task_graph = build_graph(&self.orders, &self.raw_tasks, &self.stations)?;
            let cp_model = model::build_model(&calendar, &task_graph, &self.orders, &self.stations);
            (task_graph, cp_model)
        };
        tracing::debug!(tasks = cp_model.vars.len(), horizon = cp_model.horizon, "model built");

        let solve_span = tracing::info_span!("solve");
        let outcome = {
            let _guard = solve_span.enter();
            let backend = ConstraintPropagationSolver;
            backend.solve(&cp_model, &self.solver_config)
        };
        tracing::info!(status = ?outcome.status(), "solve finished");

        debug_assert_eq!(task_graph.total_task_count(), cp_model.vars.len());

        let extract_span = tracing::info_span!("extract");
        let solution = {
            let _guard = extract_span.enter();
            extract::extract_solution(&cp_model, &outcome, &calendar, &self.orders)?
        };

        Ok(SessionOutput { solution, outcome })
    }
}

fn build_graph(
    orders: &[Order],
    raw_tasks: &[RawTask],
    stations: &[Station],
) -> Result<TaskGraph, PlannerError> {
    taskgraph::build_task_graph(orders, raw_tasks, stations)
}
