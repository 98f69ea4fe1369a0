//! CSV export of a solved [`Solution`], plus an optional debug JSON dump of
//! the raw solver outcome, grounded in `solver.py::guardar_resultado_solver_intermedio`
//! (a pickle dump there; JSON here, since nothing downstream unpickles it).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::PlannerError;
use crate::extract::{OrderSummary, Solution};
use crate::solver::SolverOutcome;
use crate::types::Station;

#[derive(Serialize)]
struct ScheduledTaskRow<'a> {
    order_ref: &'a str,
    local_index: usize,
    comp_start: i64,
    comp_end: i64,
    operators: u32,
    duration_min: i64,
    station_id: u32,
    real_start_dt: String,
    real_end_dt: String,
    required_due_dt: String,
    estimated_due_dt: String,
    delta_working_days: f64,
    lead_time_working_days: f64,
}

#[derive(Serialize)]
struct TimelineRow {
    comp_start: i64,
    comp_end: i64,
    occupancy: u32,
    shift_capacity: u32,
    percent: f64,
    real_start_dt: String,
    real_end_dt: String,
}

#[derive(Serialize)]
struct StationRow<'a> {
    station_id: u32,
    station_name: &'a str,
    capacity: u32,
}

#[derive(Serialize)]
struct OrderSummaryRow<'a> {
    reference: &'a str,
    required_dt: String,
    material_dt: String,
    final_dt: String,
    delta_working_days: f64,
    lead_time_working_days: f64,
}

#[derive(Serialize)]
struct GlobalMetricsRow {
    mean_lateness_days: f64,
    mean_lead_time_days: f64,
    mean_inter_delivery_gap_days: f64,
    working_hours_per_day: f64,
}

const DT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn write_output(
    output_dir: &Path,
    solution: &Solution,
    stations: &[Station],
    outcome: &SolverOutcome,
    debug: bool,
) -> Result<(), PlannerError> {
    fs::create_dir_all(output_dir)?;

    let summary_of: HashMap<&str, &OrderSummary> =
        solution.summaries.iter().map(|s| (s.reference.as_str(), s)).collect();

    write_csv(
        &output_dir.join("ScheduledTasks.csv"),
        solution.tasks.iter().map(|t| {
            let summary = summary_of.get(t.order_ref.as_str()).copied();
            ScheduledTaskRow {
                order_ref: &t.order_ref,
                local_index: t.local_index,
                comp_start: t.comp_start,
                comp_end: t.comp_end,
                operators: t.operators_used,
                duration_min: t.duration_min,
                station_id: t.station_id,
                real_start_dt: t.real_start.format(DT_FORMAT).to_string(),
                real_end_dt: t.real_end.format(DT_FORMAT).to_string(),
                required_due_dt: summary.map(|s| s.required_dt.format(DT_FORMAT).to_string()).unwrap_or_default(),
                estimated_due_dt: summary.map(|s| s.final_dt.format(DT_FORMAT).to_string()).unwrap_or_default(),
                delta_working_days: summary.map(|s| s.delta_working_days).unwrap_or(0.0),
                lead_time_working_days: summary.map(|s| s.lead_time_working_days).unwrap_or(0.0),
            }
        }),
    )?;

    write_csv(
        &output_dir.join("Timeline.csv"),
        solution.timeline.iter().map(|s| TimelineRow {
            comp_start: s.comp_start,
            comp_end: s.comp_end,
            occupancy: s.occupancy,
            shift_capacity: s.shift_capacity,
            percent: s.percent,
            real_start_dt: s.real_start.format(DT_FORMAT).to_string(),
            real_end_dt: s.real_end.format(DT_FORMAT).to_string(),
        }),
    )?;

    write_csv(
        &output_dir.join("Stations.csv"),
        stations.iter().map(|s| StationRow { station_id: s.id, station_name: &s.name, capacity: s.capacity }),
    )?;

    write_csv(
        &output_dir.join("OrderSummary.csv"),
        solution.summaries.iter().map(|s| OrderSummaryRow {
            reference: &s.reference,
            required_dt: s.required_dt.format(DT_FORMAT).to_string(),
            material_dt: s.material_dt.format(DT_FORMAT).to_string(),
            final_dt: s.final_dt.format(DT_FORMAT).to_string(),
            delta_working_days: s.delta_working_days,
            lead_time_working_days: s.lead_time_working_days,
        }),
    )?;

    write_csv(
        &output_dir.join("GlobalMetrics.csv"),
        std::iter::once(GlobalMetricsRow {
            mean_lateness_days: solution.metrics.mean_lateness_days,
            mean_lead_time_days: solution.metrics.mean_lead_time_days,
            mean_inter_delivery_gap_days: solution.metrics.mean_inter_delivery_gap_days,
            working_hours_per_day: solution.metrics.working_hours_per_day,
        }),
    )?;

    if debug {
        write_debug_dump(output_dir, outcome)?;
    }

    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: impl Iterator<Item = T>) -> Result<(), PlannerError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_debug_dump(output_dir: &Path, outcome: &SolverOutcome) -> Result<(), PlannerError> {
    let debug_dir = output_dir.join("debug");
    fs::create_dir_all(&debug_dir)?;

    #[derive(Serialize)]
    struct AssignmentRow {
        task_id: u32,
        start: i64,
        end: i64,
        operators: u32,
        duration: i64,
    }

    let rows: Vec<AssignmentRow> = outcome
        .assignments
        .iter()
        .map(|(id, a)| AssignmentRow {
            task_id: id.0,
            start: a.start,
            end: a.end,
            operators: a.operators,
            duration: a.duration,
        })
        .collect();

    let dump = serde_json::json!({
        "status": format!("{:?}", outcome.status()),
        "objective_value": outcome.objective_value,
        "assignments": rows,
    });

    let path = debug_dir.join("solver_outcome.json");
    fs::write(&path, serde_json::to_vec_pretty(&dump).map_err(|err| PlannerError::Io(err.into()))?)?;
    Ok(())
}
