pub mod calendar;
pub mod error;
pub mod extract;
pub mod io;
pub mod model;
pub mod session;
pub mod solver;
pub mod taskgraph;
pub mod types;

pub mod prelude {
    pub use super::calendar::{Calendar, CompressedInterval, DecompressMode, Shift};
    pub use super::error::PlannerError;
    pub use super::extract::Solution;
    pub use super::session::{Session, SessionOutput};
    pub use super::solver::{SolverConfig, SolverStatus};
    pub use super::types::{Order, Station};
}
