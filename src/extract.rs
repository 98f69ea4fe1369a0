//! Lifts a solved [`CpModel`]/[`SolverOutcome`] pair into real timestamps,
//! an occupancy timeline, and per-order delivery metrics.

use chrono::NaiveDateTime;

use crate::calendar::{Calendar, DecompressMode};
use crate::error::PlannerError;
use crate::model::CpModel;
use crate::solver::{SolverOutcome, SolverStatus};
use crate::types::Order;

#[derive(Clone, Debug)]
pub struct ScheduledTask {
    pub order_ref: String,
    pub local_index: usize,
    pub comp_start: i64,
    pub comp_end: i64,
    pub operators_used: u32,
    pub duration_min: i64,
    pub station_id: u32,
    pub real_start: NaiveDateTime,
    pub real_end: NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct TimelineSegment {
    pub comp_start: i64,
    pub comp_end: i64,
    pub occupancy: u32,
    pub shift_capacity: u32,
    pub percent: f64,
    pub real_start: NaiveDateTime,
    pub real_end: NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct OrderSummary {
    pub reference: String,
    pub required_dt: NaiveDateTime,
    pub material_dt: NaiveDateTime,
    pub final_dt: NaiveDateTime,
    pub delta_working_days: f64,
    pub lead_time_working_days: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalMetrics {
    pub mean_lateness_days: f64,
    pub mean_lead_time_days: f64,
    pub mean_inter_delivery_gap_days: f64,
    pub working_hours_per_day: f64,
}

#[derive(Clone, Debug)]
pub struct Solution {
    pub status: SolverStatus,
    pub tasks: Vec<ScheduledTask>,
    pub timeline: Vec<TimelineSegment>,
    pub summaries: Vec<OrderSummary>,
    pub metrics: GlobalMetrics,
}

pub fn extract_solution(
    model: &CpModel,
    outcome: &SolverOutcome,
    calendar: &Calendar,
    orders: &[Order],
) -> Result<Solution, PlannerError> {
    let status = outcome.status();

    if !matches!(status, SolverStatus::Optimal | SolverStatus::Feasible) {
        return Ok(Solution {
            status,
            tasks: Vec::new(),
            timeline: Vec::new(),
            summaries: Vec::new(),
            metrics: GlobalMetrics::default(),
        });
    }

    let tasks = extract_tasks(model, outcome, calendar)?;
    let timeline = build_timeline(calendar, outcome)?;
    let summaries = build_order_summaries(model, outcome, calendar, orders)?;
    let metrics = build_global_metrics(calendar, &summaries);

    Ok(Solution { status, tasks, timeline, summaries, metrics })
}

fn extract_tasks(
    model: &CpModel,
    outcome: &SolverOutcome,
    calendar: &Calendar,
) -> Result<Vec<ScheduledTask>, PlannerError> {
    let mut tasks = Vec::with_capacity(model.vars.len());

    for id in model.task_ids() {
        let vars = model.task(id);
        let assignment = &outcome.assignments[&id];

        let real_start = calendar.decompress(assignment.start, DecompressMode::Start)?;
        let real_end = calendar.decompress(assignment.end, DecompressMode::End)?;

        tasks.push(ScheduledTask {
            order_ref: vars.order_ref.clone(),
            local_index: vars.local_index,
            comp_start: assignment.start,
            comp_end: assignment.end,
            operators_used: assignment.operators,
            duration_min: assignment.duration,
            station_id: vars.station_id,
            real_start,
            real_end,
        });
    }

    tasks.sort_by(|a, b| {
        (a.comp_start, a.order_ref.as_str(), a.local_index).cmp(&(
            b.comp_start,
            b.order_ref.as_str(),
            b.local_index,
        ))
    });

    Ok(tasks)
}

/// Event-sweep over every task's occupancy span plus every shift boundary,
/// so a segment never straddles a change in either demand or capacity.
fn build_timeline(calendar: &Calendar, outcome: &SolverOutcome) -> Result<Vec<TimelineSegment>, PlannerError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Arrival,
        Departure,
    }

    let mut events: Vec<(i64, Kind, i64)> = Vec::new();
    for assignment in outcome.assignments.values() {
        events.push((assignment.start, Kind::Arrival, assignment.operators as i64));
        events.push((assignment.end, Kind::Departure, assignment.operators as i64));
    }
    for interval in calendar.intervals() {
        events.push((interval.comp_start, Kind::Arrival, 0));
        events.push((interval.comp_end, Kind::Departure, 0));
    }

    events.sort_by_key(|(t, kind, _)| (*t, if *kind == Kind::Arrival { 0 } else { 1 }));

    let mut boundaries: Vec<i64> = events.iter().map(|(t, _, _)| *t).collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut segments = Vec::new();
    for window in boundaries.windows(2) {
        let (comp_start, comp_end) = (window[0], window[1]);
        if comp_end <= comp_start {
            continue;
        }

        let occupancy: i64 = outcome
            .assignments
            .values()
            .filter(|a| a.start <= comp_start && comp_start < a.end)
            .map(|a| a.operators as i64)
            .sum();

        let shift_capacity = calendar
            .intervals()
            .iter()
            .find(|i| i.comp_start <= comp_start && comp_start < i.comp_end)
            .map(|i| i.capacity)
            .unwrap_or(0);

        let percent = if shift_capacity > 0 {
            100.0 * occupancy as f64 / shift_capacity as f64
        } else {
            0.0
        };

        let real_start = calendar.decompress(comp_start, DecompressMode::Start)?;
        let real_end = calendar.decompress(comp_end, DecompressMode::End)?;

        segments.push(TimelineSegment {
            comp_start,
            comp_end,
            occupancy: occupancy as u32,
            shift_capacity,
            percent,
            real_start,
            real_end,
        });
    }

    Ok(segments)
}

fn build_order_summaries(
    model: &CpModel,
    outcome: &SolverOutcome,
    calendar: &Calendar,
    orders: &[Order],
) -> Result<Vec<OrderSummary>, PlannerError> {
    let mut summaries = Vec::with_capacity(model.objective.orders.len());

    for order_objective in &model.objective.orders {
        let Some(order) = orders.iter().find(|o| o.reference == order_objective.order_ref) else {
            continue;
        };

        let final_comp_end = order_objective
            .final_tasks
            .iter()
            .map(|t| outcome.assignments[t].end)
            .max()
            .unwrap_or(0);
        let final_dt = calendar.decompress(final_comp_end, DecompressMode::End)?;

        let delta_working_days = signed_working_days(calendar, order.due_dt, final_dt);
        let lead_time_working_days = calendar.working_days(order.material_ready_dt, final_dt);

        summaries.push(OrderSummary {
            reference: order.reference.clone(),
            required_dt: order.due_dt,
            material_dt: order.material_ready_dt,
            final_dt,
            delta_working_days,
            lead_time_working_days,
        });
    }

    summaries.sort_by(|a, b| a.reference.cmp(&b.reference));
    Ok(summaries)
}

/// `working_days(due, final)` signed positive when late, negative when early.
fn signed_working_days(calendar: &Calendar, due_dt: NaiveDateTime, final_dt: NaiveDateTime) -> f64 {
    if final_dt >= due_dt {
        calendar.working_days(due_dt, final_dt)
    } else {
        -calendar.working_days(final_dt, due_dt)
    }
}

fn build_global_metrics(calendar: &Calendar, summaries: &[OrderSummary]) -> GlobalMetrics {
    if summaries.is_empty() {
        return GlobalMetrics { working_hours_per_day: calendar.average_hours_per_day(), ..Default::default() };
    }

    let late: Vec<f64> = summaries.iter().map(|s| s.delta_working_days).filter(|d| *d > 0.0).collect();
    let mean_lateness_days = if late.is_empty() { 0.0 } else { late.iter().sum::<f64>() / late.len() as f64 };

    let mean_lead_time_days =
        summaries.iter().map(|s| s.lead_time_working_days).sum::<f64>() / summaries.len() as f64;

    let mut finals: Vec<NaiveDateTime> = summaries.iter().map(|s| s.final_dt).collect();
    finals.sort();

    let mean_inter_delivery_gap_days = if finals.len() < 2 {
        0.0
    } else {
        let gaps: Vec<f64> = finals.windows(2).map(|w| calendar.working_days(w[0], w[1])).collect();
        gaps.iter().sum::<f64>() / gaps.len() as f64
    };

    GlobalMetrics {
        mean_lateness_days,
        mean_lead_time_days,
        mean_inter_delivery_gap_days,
        working_hours_per_day: calendar.average_hours_per_day(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Shift;
    use chrono::{NaiveDate, NaiveTime};

    fn calendar() -> Calendar {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        Calendar::build(&[Shift {
            day,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            operator_capacity: 2,
        }])
        .unwrap()
    }

    #[test]
    fn signed_working_days_is_negative_when_early() {
        let cal = calendar();
        let due = cal.intervals()[0].real_start + chrono::Duration::hours(6);
        let finished = cal.intervals()[0].real_start + chrono::Duration::hours(2);
        assert!(signed_working_days(&cal, due, finished) < 0.0);
    }

    #[test]
    fn signed_working_days_is_positive_when_late() {
        let cal = calendar();
        let due = cal.intervals()[0].real_start + chrono::Duration::hours(2);
        let finished = cal.intervals()[0].real_start + chrono::Duration::hours(6);
        assert!(signed_working_days(&cal, due, finished) > 0.0);
    }

    #[test]
    fn empty_summaries_still_report_working_hours_per_day() {
        let cal = calendar();
        let metrics = build_global_metrics(&cal, &[]);
        assert_eq!(metrics.mean_lateness_days, 0.0);
        assert!(metrics.working_hours_per_day > 0.0);
    }
}
