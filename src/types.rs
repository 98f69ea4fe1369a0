//! Entities shared across modules that don't belong to a single pipeline stage.

use chrono::NaiveDateTime;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Station {
    pub id: u32,
    pub name: String,
    pub capacity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub reference: String,
    pub due_dt: NaiveDateTime,
    pub material_ready_dt: NaiveDateTime,
}
