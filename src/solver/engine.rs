//! [`ConstraintPropagationSolver`]: the in-crate stand-in for an external
//! CP-SAT engine (spec.md §1's "delegates proof-of-optimality and
//! branching to a CP-SAT solver"). Two phases: a deterministic
//! list-scheduling sweep that never violates a constraint by construction,
//! followed by a bounded, multi-threaded local-search pass that only ever
//! accepts objective-improving moves.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::model::{Constraint, CpModel, TaskId};
use crate::taskgraph::TaskKind;

use super::{SolverBackend, SolverConfig, SolverOutcome, SolverStatus, TaskAssignment};

pub struct ConstraintPropagationSolver;

impl SolverBackend for ConstraintPropagationSolver {
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> SolverOutcome {
        let deadline = Instant::now() + config.time_limit;
        let index = ModelIndex::build(model);

        let Some(baseline) = build_feasible_schedule(model, &index) else {
            tracing::warn!("no feasible placement found within horizon {}", model.horizon);
            return SolverOutcome { status: Some(SolverStatus::Infeasible), ..Default::default() };
        };

        if Instant::now() >= deadline {
            return outcome_from(baseline, SolverStatus::Feasible);
        }

        let best = Mutex::new(baseline);
        let stale_rounds = AtomicU32::new(0);
        const STALE_THRESHOLD: u32 = 400;

        std::thread::scope(|scope| {
            for worker in 0..config.num_workers.max(1) {
                scope.spawn(|| {
                    let mut rng = Xorshift64::seeded(0x9E37_79B9 ^ (worker as u64 + 1));
                    loop {
                        if Instant::now() >= deadline {
                            return;
                        }
                        if stale_rounds.load(Ordering::Relaxed) >= STALE_THRESHOLD {
                            return;
                        }

                        let candidate = {
                            let current = best.lock().unwrap();
                            if rng.next_u64() % 2 == 0 {
                                propose_neighbour(model, &index, &current, &mut rng)
                            } else {
                                propose_resequence(model, &index, &current, &mut rng)
                            }
                        };

                        let Some(candidate) = candidate else {
                            stale_rounds.fetch_add(1, Ordering::Relaxed);
                            continue;
                        };

                        let mut current = best.lock().unwrap();
                        if candidate.objective < current.objective {
                            *current = candidate;
                            stale_rounds.store(0, Ordering::Relaxed);
                        } else {
                            stale_rounds.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        let exhausted = stale_rounds.load(Ordering::Relaxed) >= STALE_THRESHOLD;
        let status = if exhausted { SolverStatus::Optimal } else { SolverStatus::Feasible };
        let final_schedule = best.into_inner().unwrap();
        outcome_from(final_schedule, status)
    }
}

#[derive(Clone, Debug)]
struct Schedule {
    assignments: HashMap<TaskId, TaskAssignment>,
    objective: i64,
}

fn outcome_from(schedule: Schedule, status: SolverStatus) -> SolverOutcome {
    SolverOutcome {
        status: Some(status),
        assignments: schedule.assignments,
        objective_value: Some(schedule.objective),
    }
}

/// Precomputed adjacency over a [`CpModel`]'s constraints, built once per solve.
struct ModelIndex {
    predecessors: HashMap<TaskId, Vec<TaskId>>,
    successors: HashMap<TaskId, Vec<TaskId>>,
    material_release: HashMap<TaskId, i64>,
    station_of: HashMap<TaskId, u32>,
    station_capacity: HashMap<u32, u32>,
    same_station: HashMap<TaskId, Vec<TaskId>>,
    kind_mutex_partners: HashMap<TaskId, Vec<TaskId>>,
    /// `(comp_start, comp_end, capacity)`, sorted by `comp_start`.
    shift_segments: Vec<(i64, i64, u32)>,
    /// Every distinct `comp_start`/`comp_end` in `shift_segments`, sorted and
    /// deduped — the timestamps where operator capacity can change.
    shift_boundaries: Vec<i64>,
    /// Each task's order's `due_min`, for tie-breaking phase-1 placement
    /// order and resequencing moves by urgency rather than by `TaskId`.
    task_priority: HashMap<TaskId, i64>,
}

impl ModelIndex {
    fn build(model: &CpModel) -> Self {
        let mut predecessors: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut successors: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut material_release = HashMap::new();
        let mut station_of = HashMap::new();
        let mut station_capacity = HashMap::new();
        let mut same_station: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut kind_mutex_partners: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut shift_segments = Vec::new();

        for constraint in &model.constraints {
            match constraint {
                Constraint::Precedence { pred, succ } => {
                    predecessors.entry(*succ).or_default().push(*pred);
                    successors.entry(*pred).or_default().push(*succ);
                }
                Constraint::StationCapacity { station_id, capacity, tasks } => {
                    station_capacity.insert(*station_id, *capacity);
                    for &t in tasks {
                        station_of.insert(t, *station_id);
                    }
                    for &a in tasks {
                        for &b in tasks {
                            if a != b {
                                same_station.entry(a).or_default().push(b);
                            }
                        }
                    }
                }
                Constraint::ShiftOperatorCapacity { comp_start, comp_end, capacity, .. } => {
                    shift_segments.push((*comp_start, *comp_end, *capacity));
                }
                Constraint::MaterialRelease { task, min_start } => {
                    material_release.insert(*task, *min_start);
                }
                Constraint::KindMutex { a, b } => {
                    kind_mutex_partners.entry(*a).or_default().push(*b);
                    kind_mutex_partners.entry(*b).or_default().push(*a);
                }
            }
        }

        shift_segments.sort_unstable_by_key(|(s, _, _)| *s);

        let mut shift_boundaries: Vec<i64> =
            shift_segments.iter().flat_map(|&(s, e, _)| [s, e]).collect();
        shift_boundaries.sort_unstable();
        shift_boundaries.dedup();

        let due_min_of: HashMap<&str, i64> =
            model.objective.orders.iter().map(|o| (o.order_ref.as_str(), o.due_min)).collect();
        let task_priority: HashMap<TaskId, i64> = model
            .task_ids()
            .map(|id| {
                let due_min = due_min_of.get(model.task(id).order_ref.as_str()).copied().unwrap_or(i64::MAX);
                (id, due_min)
            })
            .collect();

        Self {
            predecessors,
            successors,
            material_release,
            station_of,
            station_capacity,
            same_station,
            kind_mutex_partners,
            shift_segments,
            shift_boundaries,
            task_priority,
        }
    }

    fn capacity_at(&self, t: i64) -> i64 {
        for &(s, e, cap) in &self.shift_segments {
            if t >= s && t < e {
                return cap as i64;
            }
        }
        i64::MAX
    }

    /// Kahn's algorithm, breaking ties between simultaneously-ready tasks by
    /// `(task_priority, TaskId)` rather than raw `TaskId` — the more urgent
    /// (sooner-due) task is placed first instead of whichever sorts first
    /// alphabetically by `order_ref`.
    fn topological_order(&self, model: &CpModel) -> Option<Vec<TaskId>> {
        let n = model.vars.len();
        let mut indegree = vec![0u32; n];
        for (succ, preds) in &self.predecessors {
            indegree[succ.0 as usize] = preds.len() as u32;
        }

        let priority_of = |i: u32| (self.task_priority.get(&TaskId(i)).copied().unwrap_or(i64::MAX), i);

        let mut ready: BinaryHeap<Reverse<(i64, u32)>> = (0..n as u32)
            .filter(|&i| indegree[i as usize] == 0)
            .map(|i| Reverse(priority_of(i)))
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(Reverse((_, next))) = ready.pop() {
            let id = TaskId(next);
            order.push(id);
            if let Some(succs) = self.successors.get(&id) {
                for &succ in succs {
                    let entry = &mut indegree[succ.0 as usize];
                    *entry -= 1;
                    if *entry == 0 {
                        ready.push(Reverse(priority_of(succ.0)));
                    }
                }
            }
        }

        if order.len() == n {
            Some(order)
        } else {
            None
        }
    }
}

/// Phase 1: place every task, in topological order, at the earliest start
/// time (trying shorter durations first) that keeps every constraint
/// satisfied against everything already placed. Fails only if some task
/// cannot be placed within `model.horizon` under any operator count.
fn build_feasible_schedule(model: &CpModel, index: &ModelIndex) -> Option<Schedule> {
    let order = index.topological_order(model)?;

    let mut assignments: HashMap<TaskId, TaskAssignment> = HashMap::new();

    for id in order {
        let vars = model.task(id);

        let mut lower_bound = index.material_release.get(&id).copied().unwrap_or(0);
        if let Some(preds) = index.predecessors.get(&id) {
            for pred in preds {
                lower_bound = lower_bound.max(assignments[pred].end);
            }
        }

        let operator_candidates: Vec<u32> = match vars.kind {
            TaskKind::Verification => vec![0],
            TaskKind::Operative => (vars.min_ops..=vars.max_ops).rev().collect(),
        };

        let mut placed = None;
        for operators in operator_candidates {
            let duration = vars.duration_for(operators);
            if let Some(start) = earliest_feasible_start(model, index, &assignments, id, lower_bound, duration, operators) {
                placed = Some(TaskAssignment { start, end: start + duration, operators, duration });
                break;
            }
        }

        let assignment = placed?;
        assignments.insert(id, assignment);
    }

    let objective = evaluate_objective(model, &assignments);
    Some(Schedule { assignments, objective })
}

fn earliest_feasible_start(
    model: &CpModel,
    index: &ModelIndex,
    placed: &HashMap<TaskId, TaskAssignment>,
    task: TaskId,
    lower_bound: i64,
    duration: i64,
    operators: u32,
) -> Option<i64> {
    let mut candidates: BTreeSet<i64> = BTreeSet::new();
    candidates.insert(lower_bound);
    for (start, end, _) in placed.values().map(|a| (a.start, a.end, ())) {
        if start >= lower_bound {
            candidates.insert(start);
        }
        if end >= lower_bound {
            candidates.insert(end);
        }
    }
    for &(s, e, _) in &index.shift_segments {
        if s >= lower_bound {
            candidates.insert(s);
        }
        if e >= lower_bound {
            candidates.insert(e);
        }
    }

    let same_station = index.same_station.get(&task).cloned().unwrap_or_default();
    let station_capacity = index
        .station_of
        .get(&task)
        .and_then(|s| index.station_capacity.get(s))
        .copied()
        .unwrap_or(1) as i64;
    let mutex_partners = index.kind_mutex_partners.get(&task).cloned().unwrap_or_default();

    for start in candidates {
        if start > model.horizon {
            break;
        }
        let end = start + duration;
        if end > model.horizon {
            continue;
        }

        if !mutex_partners.iter().all(|partner| {
            let Some(p) = placed.get(partner) else { return true };
            end <= p.start || p.end <= start
        }) {
            continue;
        }

        let station_others: Vec<(i64, i64, i64)> = same_station
            .iter()
            .filter_map(|t| placed.get(t).map(|a| (a.start, a.end, 1i64)))
            .collect();
        if !fits_capacity((start, end, 1), &station_others, |_| station_capacity, &[]) {
            continue;
        }

        let operator_others: Vec<(i64, i64, i64)> =
            placed.values().map(|a| (a.start, a.end, a.operators as i64)).collect();
        if !fits_capacity(
            (start, end, operators as i64),
            &operator_others,
            |t| index.capacity_at(t),
            &index.shift_boundaries,
        ) {
            continue;
        }

        return Some(start);
    }

    None
}

/// Samples demand only at event times touching `candidate`'s own span, plus
/// any capacity-change `boundaries` the span crosses — demand is piecewise
/// constant between events and boundaries alike, so that is where its
/// maximum can occur. A candidate that itself spans a capacity-decreasing
/// boundary would otherwise never be sampled there, since no *other* task
/// needs to start or end at that instant.
fn fits_capacity(
    candidate: (i64, i64, i64),
    others: &[(i64, i64, i64)],
    capacity_at: impl Fn(i64) -> i64,
    boundaries: &[i64],
) -> bool {
    let (cs, ce, cd) = candidate;
    if ce <= cs {
        return cd <= capacity_at(cs);
    }

    let mut events: BTreeSet<i64> = BTreeSet::new();
    events.insert(cs);
    for &(s, e, _) in others {
        if s > cs && s < ce {
            events.insert(s);
        }
        if e > cs && e < ce {
            events.insert(e);
        }
    }
    for &b in boundaries {
        if b > cs && b < ce {
            events.insert(b);
        }
    }

    for t in events {
        let mut demand = cd;
        for &(s, e, d) in others {
            if s <= t && t < e {
                demand += d;
            }
        }
        if demand > capacity_at(t) {
            return false;
        }
    }
    true
}

fn evaluate_objective(model: &CpModel, assignments: &HashMap<TaskId, TaskAssignment>) -> i64 {
    let mut order_ends: HashMap<&str, i64> = HashMap::new();
    for order in &model.objective.orders {
        let end = order
            .final_tasks
            .iter()
            .map(|t| assignments[t].end)
            .max()
            .unwrap_or(0);
        order_ends.insert(order.order_ref.as_str(), end);
    }

    let makespan = assignments.values().map(|a| a.end).max().unwrap_or(0);
    let (_, _, combined) = model.objective.evaluate(&order_ends, makespan);
    combined
}

/// One speculative move: pick a random operative task and either change its
/// operator count or nudge its start, re-placing every task that depends on
/// it (directly or transitively) so the result stays feasible by
/// construction, then re-evaluate the objective.
fn propose_neighbour(
    model: &CpModel,
    index: &ModelIndex,
    current: &Schedule,
    rng: &mut Xorshift64,
) -> Option<Schedule> {
    let operative_tasks: Vec<TaskId> = model
        .task_ids()
        .filter(|id| matches!(model.task(*id).kind, TaskKind::Operative))
        .collect();
    if operative_tasks.is_empty() {
        return None;
    }

    let pick = operative_tasks[(rng.next_u64() as usize) % operative_tasks.len()];
    let vars = model.task(pick);
    if vars.min_ops == vars.max_ops {
        return None;
    }

    let span = vars.max_ops - vars.min_ops + 1;
    let new_operators = vars.min_ops + (rng.next_u64() as u32 % span);
    if new_operators == current.assignments[&pick].operators {
        return None;
    }

    let order = index.topological_order(model)?;
    let mut assignments = current.assignments.clone();

    for id in order {
        if id == pick {
            let lower_bound = lower_bound_for(index, &assignments, id);
            let duration = vars.duration_for(new_operators);
            let start =
                earliest_feasible_start(model, index, &strip_downstream(index, &assignments, id), id, lower_bound, duration, new_operators)?;
            assignments.insert(id, TaskAssignment { start, end: start + duration, operators: new_operators, duration });
        } else if depends_on(index, id, pick) {
            let task_vars = model.task(id);
            let lower_bound = lower_bound_for(index, &assignments, id);
            let operators = assignments[&id].operators;
            let duration = task_vars.duration_for(operators);
            let start = earliest_feasible_start(
                model,
                index,
                &strip_downstream(index, &assignments, id),
                id,
                lower_bound,
                duration,
                operators,
            )?;
            assignments.insert(id, TaskAssignment { start, end: start + duration, operators, duration });
        }
    }

    let objective = evaluate_objective(model, &assignments);
    Some(Schedule { assignments, objective })
}

/// The other speculative move: `propose_neighbour` alone only ever mutates
/// operator counts, so when two independent tasks compete for the same
/// station, whichever phase 1 happened to place first keeps that slot
/// forever — no mutation changes relative order. This move looks for such a
/// pair where the less urgent (later-due) task currently starts first,
/// strips both and everything downstream of either, and re-places the
/// stripped set in priority-tie-broken topological order so the more urgent
/// task gets first claim on the station.
fn propose_resequence(
    model: &CpModel,
    index: &ModelIndex,
    current: &Schedule,
    rng: &mut Xorshift64,
) -> Option<Schedule> {
    let mut violations: Vec<(TaskId, TaskId)> = Vec::new();
    for (&id, partners) in &index.same_station {
        for &partner in partners {
            if id.0 >= partner.0 {
                continue;
            }
            if depends_on(index, partner, id) || depends_on(index, id, partner) {
                continue;
            }
            let (Some(a), Some(b)) = (current.assignments.get(&id), current.assignments.get(&partner)) else {
                continue;
            };
            let (first, second) = if a.start <= b.start { (id, partner) } else { (partner, id) };
            let pri_first = index.task_priority.get(&first).copied().unwrap_or(i64::MAX);
            let pri_second = index.task_priority.get(&second).copied().unwrap_or(i64::MAX);
            if pri_second < pri_first {
                violations.push((first, second));
            }
        }
    }

    if violations.is_empty() {
        return None;
    }
    let (first, second) = violations[(rng.next_u64() as usize) % violations.len()];

    let mut assignments = strip_downstream(index, &current.assignments, first);
    assignments = strip_downstream(index, &assignments, second);

    let order = index.topological_order(model)?;
    for id in order {
        if assignments.contains_key(&id) {
            continue;
        }
        let vars = model.task(id);
        let lower_bound = lower_bound_for(index, &assignments, id);
        let operators = current.assignments.get(&id).map(|a| a.operators).unwrap_or(vars.max_ops);
        let duration = vars.duration_for(operators);
        let start = earliest_feasible_start(model, index, &assignments, id, lower_bound, duration, operators)?;
        assignments.insert(id, TaskAssignment { start, end: start + duration, operators, duration });
    }

    let objective = evaluate_objective(model, &assignments);
    Some(Schedule { assignments, objective })
}

fn lower_bound_for(index: &ModelIndex, assignments: &HashMap<TaskId, TaskAssignment>, id: TaskId) -> i64 {
    let mut lower_bound = index.material_release.get(&id).copied().unwrap_or(0);
    if let Some(preds) = index.predecessors.get(&id) {
        for pred in preds {
            if let Some(a) = assignments.get(pred) {
                lower_bound = lower_bound.max(a.end);
            }
        }
    }
    lower_bound
}

fn depends_on(index: &ModelIndex, candidate: TaskId, root: TaskId) -> bool {
    let mut stack = vec![root];
    let mut seen = BTreeSet::new();
    while let Some(t) = stack.pop() {
        if !seen.insert(t.0) {
            continue;
        }
        if let Some(succs) = index.successors.get(&t) {
            for &s in succs {
                if s == candidate {
                    return true;
                }
                stack.push(s);
            }
        }
    }
    false
}

/// Removes `id` and everything reachable from it so `earliest_feasible_start`
/// only sees tasks unaffected by the move being evaluated.
fn strip_downstream(
    index: &ModelIndex,
    assignments: &HashMap<TaskId, TaskAssignment>,
    id: TaskId,
) -> HashMap<TaskId, TaskAssignment> {
    let mut out = assignments.clone();
    out.remove(&id);
    let mut stack = vec![id];
    let mut seen = BTreeSet::new();
    while let Some(t) = stack.pop() {
        if !seen.insert(t.0) {
            continue;
        }
        if let Some(succs) = index.successors.get(&t) {
            for &s in succs {
                out.remove(&s);
                stack.push(s);
            }
        }
    }
    out
}

/// Small deterministic PRNG so local search is reproducible across runs of
/// the same model without pulling in an external RNG crate.
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn seeded(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}
