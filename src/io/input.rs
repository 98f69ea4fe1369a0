//! CSV ingestion of the four logical tables spec.md §6.1 names: ORDERS,
//! CALENDAR, TASKS, STATIONS. Column names match the contract verbatim.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::calendar::Shift;
use crate::error::PlannerError;
use crate::taskgraph::RawTask;
use crate::types::{Order, Station};

pub struct InputTables {
    pub orders: Vec<Order>,
    pub shifts: Vec<Shift>,
    pub raw_tasks: Vec<RawTask>,
    pub stations: Vec<Station>,
}

#[derive(Deserialize)]
struct OrderRow {
    reference: String,
    due_date: NaiveDateTime,
    material_ready_date: NaiveDateTime,
}

#[derive(Deserialize)]
struct CalendarRow {
    day: NaiveDate,
    #[allow(dead_code)]
    shift_id: i64,
    start_time: NaiveTime,
    end_time: NaiveTime,
    operator_count: u32,
}

#[derive(Deserialize)]
struct StationRow {
    station_id: u32,
    station_name: String,
    capacity: u32,
}

pub fn load_input(input_dir: &Path) -> Result<InputTables, PlannerError> {
    let orders = read_table::<OrderRow>(&input_dir.join("ORDERS.csv"))?
        .into_iter()
        .map(|row| Order {
            reference: row.reference,
            due_dt: row.due_date,
            material_ready_dt: row.material_ready_date,
        })
        .collect();

    let shifts = read_table::<CalendarRow>(&input_dir.join("CALENDAR.csv"))?
        .into_iter()
        .map(|row| Shift {
            day: row.day,
            start_time: row.start_time,
            end_time: row.end_time,
            operator_capacity: row.operator_count,
        })
        .collect();

    let raw_tasks = read_table::<RawTask>(&input_dir.join("TASKS.csv"))?;

    let stations = read_table::<StationRow>(&input_dir.join("STATIONS.csv"))?
        .into_iter()
        .map(|row| Station { id: row.station_id, name: row.station_name, capacity: row.capacity })
        .collect();

    Ok(InputTables { orders, shifts, raw_tasks, stations })
}

fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, PlannerError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}
