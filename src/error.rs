//! Error taxonomy for the planning pipeline.
//!
//! Mirrors the shape of a schedulability-test error: named variants instead
//! of a single opaque [`anyhow::Error`], so a caller can match on *kind*
//! before deciding whether a failure is fatal (see module docs in
//! `session`).

#[derive(Debug)]
pub enum PlannerError {
    /// Unreferenced predecessor id, cyclic precedence, `operators_max < 1`
    /// for an operative task, or a task referencing an unknown station.
    InvalidInput(anyhow::Error),
    /// The compressed calendar has zero working minutes; no model can be built.
    EmptyCalendar,
    /// `decompress` was asked for a compressed minute outside the calendar's range.
    OutOfCalendarRange { requested: i64, valid_range: (i64, i64) },
    /// The solver's wall-clock limit elapsed without a feasible incumbent.
    SolverTimeout,
    /// The solver proved no schedule exists under the stated constraints.
    Infeasible,
    /// Input/output adapter failure (CSV, JSON, filesystem).
    Io(anyhow::Error),
}

impl std::fmt::Display for PlannerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use PlannerError::*;

        match self {
            InvalidInput(err) => write!(f, "invalid input: {err}"),
            EmptyCalendar => write!(f, "calendar compresses to zero working minutes"),
            OutOfCalendarRange { requested, valid_range } => write!(
                f,
                "compressed minute {requested} is out of calendar range {:?}",
                valid_range
            ),
            SolverTimeout => write!(f, "solver wall-clock limit elapsed without a feasible solution"),
            Infeasible => write!(f, "no schedule satisfies the stated constraints"),
            Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for PlannerError {}

impl PlannerError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(anyhow::format_err!("{}", reason.into()))
    }
}

impl From<csv::Error> for PlannerError {
    fn from(err: csv::Error) -> Self {
        Self::Io(err.into())
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.into())
    }
}
