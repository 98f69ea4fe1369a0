//! CSV adapters: the thin, non-core plumbing around the planning core.
//! Column sets and table names are the contract described in spec.md §6.

pub mod input;
pub mod output;

pub use input::{load_input, InputTables};
pub use output::write_output;
