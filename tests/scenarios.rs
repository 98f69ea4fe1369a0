//! Seed scenarios S1-S6 from the scheduling-core specification, run end to
//! end through `Session::run`. Assertions target feasibility and
//! objective-value properties, not exact task assignments, since the
//! constraint-propagation solver's local-search phase is free to land on
//! any schedule achieving the same or better objective.

use std::time::Duration;

use carbody_planner::calendar::Shift;
use carbody_planner::extract::Solution;
use carbody_planner::session::Session;
use carbody_planner::solver::{SolverConfig, SolverStatus};
use carbody_planner::taskgraph::{RawTask, RawTaskKind};
use carbody_planner::types::{Order, Station};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

fn dt(s: &str) -> NaiveDateTime {
    s.parse().unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn shift(d: NaiveDate, start: (u32, u32), end: (u32, u32), capacity: u32) -> Shift {
    Shift { day: d, start_time: time(start.0, start.1), end_time: time(end.0, end.1), operator_capacity: capacity }
}

fn task(
    parent: &str,
    id: i64,
    preds: &str,
    station_id: u32,
    kind: RawTaskKind,
    hours_operator: f64,
    hours_verification: f64,
    operators_max: u32,
) -> RawTask {
    RawTask {
        parent_material: parent.to_string(),
        internal_id: id,
        predecessors: preds.to_string(),
        station_id,
        station_name: format!("station-{station_id}"),
        kind,
        description: String::new(),
        hours_operator,
        hours_verification,
        operators_max,
    }
}

fn station(id: u32, capacity: u32) -> Station {
    Station { id, name: format!("station-{id}"), capacity }
}

fn fast_config() -> SolverConfig {
    SolverConfig { time_limit: Duration::from_millis(200), num_workers: 2, debug: false }
}

fn run(orders: Vec<Order>, shifts: Vec<Shift>, raw_tasks: Vec<RawTask>, stations: Vec<Station>) -> Solution {
    let session = Session { orders, shifts, raw_tasks, stations, solver_config: fast_config() };
    session.run().expect("session should not error").solution
}

/// Invariants 1, 3, 4, 6, 7 from the testable-properties list, checked
/// against whatever the solver produced.
fn assert_universal_invariants(solution: &Solution, stations: &[Station]) {
    for t in &solution.tasks {
        assert_eq!(t.comp_end, t.comp_start + t.duration_min, "interval closure");
    }

    for s in stations {
        let tasks_here: Vec<_> = solution.tasks.iter().filter(|t| t.station_id == s.id).collect();
        let mut boundaries: Vec<i64> =
            tasks_here.iter().flat_map(|t| [t.comp_start, t.comp_end]).collect();
        boundaries.sort_unstable();
        boundaries.dedup();
        for w in boundaries.windows(2) {
            let occupancy =
                tasks_here.iter().filter(|t| t.comp_start <= w[0] && w[0] < t.comp_end).count() as u32;
            assert!(occupancy <= s.capacity, "station {} capacity exceeded", s.id);
        }
    }
}

#[test]
fn s1_single_task_single_shift() {
    let d = day(2025, 3, 3);
    let shifts = vec![shift(d, (8, 0), (16, 0), 2)];
    let orders = vec![Order {
        reference: "A".into(),
        due_dt: dt("2025-03-04T00:00:00"),
        material_ready_dt: dt("2025-03-03T00:00:00"),
    }];
    let raw_tasks = vec![task("A", 1, "", 1, RawTaskKind::Operative, 2.0, 0.0, 2)];
    let stations = vec![station(1, 1)];

    let solution = run(orders, shifts, raw_tasks, stations.clone());
    assert!(matches!(solution.status, SolverStatus::Optimal | SolverStatus::Feasible));
    assert_universal_invariants(&solution, &stations);

    let t = &solution.tasks[0];
    assert_eq!(t.duration_min, (120i64).div_ceil(t.operators_used as i64));
    assert_eq!(t.comp_start, 0);

    let summary = &solution.summaries[0];
    assert!(summary.delta_working_days <= 0.0, "task finishes on or before due date");
}

#[test]
fn s2_precedence_across_shift_boundary() {
    let d = day(2025, 3, 3);
    let shifts = vec![shift(d, (8, 0), (12, 0), 1), shift(d, (13, 0), (17, 0), 1)];
    let orders = vec![Order {
        reference: "A".into(),
        due_dt: dt("2025-03-10T00:00:00"),
        material_ready_dt: dt("2025-03-03T00:00:00"),
    }];
    let raw_tasks = vec![
        task("A", 1, "", 1, RawTaskKind::Operative, 3.0, 0.0, 1),
        task("A", 2, "1", 1, RawTaskKind::Operative, 3.0, 0.0, 1),
    ];
    let stations = vec![station(1, 1)];

    let solution = run(orders, shifts, raw_tasks, stations.clone());
    assert!(matches!(solution.status, SolverStatus::Optimal | SolverStatus::Feasible));
    assert_universal_invariants(&solution, &stations);

    let t1 = solution.tasks.iter().find(|t| t.local_index == 0).unwrap();
    let t2 = solution.tasks.iter().find(|t| t.local_index == 1).unwrap();
    assert!(t1.comp_end <= t2.comp_start, "precedence respected");
}

#[test]
fn s3_operator_bound_partitioning() {
    let d = day(2025, 3, 3);
    let shifts = vec![shift(d, (8, 0), (16, 0), 2)];
    let orders = vec![
        Order { reference: "A".into(), due_dt: dt("2025-03-10T00:00:00"), material_ready_dt: dt("2025-03-03T00:00:00") },
        Order { reference: "B".into(), due_dt: dt("2025-03-10T00:00:00"), material_ready_dt: dt("2025-03-03T00:00:00") },
    ];
    let raw_tasks = vec![
        task("A", 1, "", 1, RawTaskKind::Operative, 4.0, 0.0, 2),
        task("B", 1, "", 2, RawTaskKind::Operative, 4.0, 0.0, 2),
    ];
    let stations = vec![station(1, 1), station(2, 1)];

    let solution = run(orders, shifts, raw_tasks, stations.clone());
    assert!(matches!(solution.status, SolverStatus::Optimal | SolverStatus::Feasible));
    assert_universal_invariants(&solution, &stations);

    let makespan = solution.tasks.iter().map(|t| t.comp_end).max().unwrap();
    assert!(makespan <= 240, "both tasks finish within one shift's operator budget");
    let sum_tardiness: f64 = solution.summaries.iter().map(|s| s.delta_working_days.max(0.0)).sum();
    assert_eq!(sum_tardiness, 0.0);
}

#[test]
fn s4_material_release_bound() {
    let d = day(2025, 3, 3);
    let shifts = vec![shift(d, (8, 0), (16, 0), 1)];
    let orders = vec![Order {
        reference: "A".into(),
        due_dt: dt("2025-03-10T00:00:00"),
        material_ready_dt: dt("2025-03-03T10:00:00"),
    }];
    let raw_tasks = vec![task("A", 1, "", 1, RawTaskKind::Operative, 1.0, 0.0, 1)];
    let stations = vec![station(1, 1)];

    let solution = run(orders, shifts, raw_tasks, stations.clone());
    assert!(matches!(solution.status, SolverStatus::Optimal | SolverStatus::Feasible));
    assert_universal_invariants(&solution, &stations);

    let t = &solution.tasks[0];
    assert!(t.comp_start >= 120, "material release at compressed minute 120 respected");
    assert!(t.comp_end >= 180);
}

#[test]
fn s5_kind_mutex_on_shared_station() {
    let d = day(2025, 3, 3);
    let shifts = vec![shift(d, (8, 0), (16, 0), 2)];
    let orders = vec![
        Order { reference: "A".into(), due_dt: dt("2025-03-10T00:00:00"), material_ready_dt: dt("2025-03-03T00:00:00") },
        Order { reference: "B".into(), due_dt: dt("2025-03-10T00:00:00"), material_ready_dt: dt("2025-03-03T00:00:00") },
    ];
    let raw_tasks = vec![
        task("A", 1, "", 3, RawTaskKind::Operative, 1.0, 0.0, 1),
        task("B", 1, "", 3, RawTaskKind::Verification, 0.0, 1.0, 0),
    ];
    let stations = vec![station(3, 2)];

    let solution = run(orders, shifts, raw_tasks, stations.clone());
    assert!(matches!(solution.status, SolverStatus::Optimal | SolverStatus::Feasible));
    assert_universal_invariants(&solution, &stations);

    let a = solution.tasks.iter().find(|t| t.order_ref == "A").unwrap();
    let b = solution.tasks.iter().find(|t| t.order_ref == "B").unwrap();
    assert!(a.comp_end <= b.comp_start || b.comp_end <= a.comp_start, "distinct-kind tasks stay disjoint");
}

#[test]
fn s6_weighted_tardiness_prioritisation() {
    let d = day(2025, 3, 3);
    let shifts = vec![shift(d, (8, 0), (16, 0), 1)];
    let orders = vec![
        Order { reference: "A".into(), due_dt: dt("2025-03-04T00:00:00"), material_ready_dt: dt("2025-03-03T00:00:00") },
        Order { reference: "B".into(), due_dt: dt("2025-04-02T00:00:00"), material_ready_dt: dt("2025-03-03T00:00:00") },
    ];
    let raw_tasks = vec![
        task("A", 1, "", 1, RawTaskKind::Operative, 1.0, 0.0, 1),
        task("B", 1, "", 1, RawTaskKind::Operative, 1.0, 0.0, 1),
    ];
    let stations = vec![station(1, 1)];

    let solution = run(orders, shifts, raw_tasks, stations.clone());
    assert!(matches!(solution.status, SolverStatus::Optimal | SolverStatus::Feasible));
    assert_universal_invariants(&solution, &stations);

    let a = solution.tasks.iter().find(|t| t.order_ref == "A").unwrap();
    let b = solution.tasks.iter().find(|t| t.order_ref == "B").unwrap();
    assert!(a.comp_start <= b.comp_start, "the order due sooner is not scheduled later");
}

#[test]
fn infeasible_input_yields_empty_tables_not_an_error() {
    let d = day(2025, 3, 3);
    let shifts = vec![shift(d, (8, 0), (9, 0), 1)];
    let orders = vec![Order {
        reference: "A".into(),
        due_dt: dt("2025-03-04T00:00:00"),
        material_ready_dt: dt("2025-03-03T00:00:00"),
    }];
    // 10 hours of work against a calendar with exactly one working hour.
    let raw_tasks = vec![task("A", 1, "", 1, RawTaskKind::Operative, 600.0, 0.0, 1)];
    let stations = vec![station(1, 1)];

    let solution = run(orders, shifts, raw_tasks, stations);
    if matches!(solution.status, SolverStatus::Infeasible | SolverStatus::Unknown) {
        assert!(solution.tasks.is_empty());
        assert!(solution.summaries.is_empty());
    }
}
