//! Scheduler (C5): the runtime state machine a pool of build workers pulls
//! work from. Shared across threads behind a single `Mutex`; every public
//! operation takes the lock, mutates, and returns.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use crate::error::SchedulerError;
use crate::grouping::BuildGroup;
use crate::recipe::RecipeId;

/// Maximum batch size accepted by [`Schedule::next_batch`] (exclusive upper
/// bound from §4.5: `1 <= n < 100`).
const MAX_BATCH_SIZE: usize = 99;

/// Runtime state of one member of a Simple group.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MemberState {
    /// Blocked on the given subset of its in-group dependencies.
    Waiting(BTreeSet<RecipeId>),
    /// Unblocked, queued for dispatch.
    Ready,
    /// Dispensed to a worker, not yet reported.
    Building,
    /// Successfully completed.
    Accomplished,
}

#[derive(Debug)]
struct SimpleGroupState {
    on: HashMap<RecipeId, BTreeSet<RecipeId>>,
    by: HashMap<RecipeId, BTreeSet<RecipeId>>,
    priority: HashMap<RecipeId, i64>,
    state: HashMap<RecipeId, MemberState>,
}

impl SimpleGroupState {
    fn new(
        members: &[RecipeId],
        on: HashMap<RecipeId, BTreeSet<RecipeId>>,
        by: HashMap<RecipeId, BTreeSet<RecipeId>>,
        priority: HashMap<RecipeId, i64>,
    ) -> Self {
        let state = members
            .iter()
            .map(|&id| {
                let waiting = on.get(&id).cloned().unwrap_or_default();
                let initial = if waiting.is_empty() {
                    MemberState::Ready
                } else {
                    MemberState::Waiting(waiting)
                };
                (id, initial)
            })
            .collect();

        Self { on, by, priority, state }
    }

    fn is_accomplished(&self) -> bool {
        self.state.values().all(|s| *s == MemberState::Accomplished)
    }
}

#[derive(Debug)]
struct CircularGroupState {
    order: Vec<RecipeId>,
    /// Index into `order` of the next member to build.
    cursor: usize,
    /// Whether `order[cursor]` is currently dispensed to a worker.
    in_flight: bool,
}

impl CircularGroupState {
    fn new(order: Vec<RecipeId>) -> Self {
        Self { order, cursor: 0, in_flight: false }
    }

    fn is_accomplished(&self) -> bool {
        self.cursor >= self.order.len()
    }
}

#[derive(Debug)]
enum GroupState {
    Simple(SimpleGroupState),
    Circular(CircularGroupState),
}

impl GroupState {
    fn is_accomplished(&self) -> bool {
        match self {
            GroupState::Simple(g) => g.is_accomplished(),
            GroupState::Circular(g) => g.is_accomplished(),
        }
    }
}

/// Snapshot counts for one group, returned by [`Schedule::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Total members in the group.
    pub total: usize,
    /// Members still waiting on an in-group dependency.
    pub waiting: usize,
    /// Members queued for dispatch.
    pub ready: usize,
    /// Members dispensed but unreported.
    pub building: usize,
    /// Members successfully completed.
    pub accomplished: usize,
}

impl std::ops::AddAssign for GroupStats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.waiting += other.waiting;
        self.ready += other.ready;
        self.building += other.building;
        self.accomplished += other.accomplished;
    }
}

/// Snapshot of the whole schedule's progress, returned by [`Schedule::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleStats {
    /// Totals across every group.
    pub overall: GroupStats,
    /// Per-group breakdown, in group order.
    pub groups: Vec<GroupStats>,
    /// Whether the schedule has completed every group.
    pub done: bool,
}

struct SchedulerState {
    groups: Vec<GroupState>,
    /// Index of the group presently building. `== groups.len()` means `Done`.
    current: usize,
}

impl SchedulerState {
    fn current_group_mut(&mut self) -> Option<&mut GroupState> {
        self.groups.get_mut(self.current)
    }

    /// Advance `current` past any groups that are already fully
    /// accomplished (a freshly-completed group, or one with no work at all).
    fn advance_if_accomplished(&mut self) {
        while self.current < self.groups.len() && self.groups[self.current].is_accomplished() {
            self.current += 1;
        }
    }

    fn is_done(&self) -> bool {
        self.current >= self.groups.len()
    }
}

/// The top-level scheduled build: an ordered sequence of build groups plus
/// the mutable runtime state a worker pool dispatches against.
///
/// `Schedule` is `Send + Sync`; every operation serializes behind a single
/// internal `Mutex`, matching §5's concurrency model (no async, no internal
/// timers — a worker that abandons work must call [`Schedule::report_failure`]
/// itself).
pub struct Schedule {
    state: Mutex<SchedulerState>,
    /// Recipe short name, for tie-breaking dispatch order and diagnostics.
    names: HashMap<RecipeId, String>,
}

impl Schedule {
    /// Build a schedule from already-classified build groups.
    ///
    /// This is the final assembly step of `Schedule::build`'s C1-C4
    /// pipeline; most callers should use that instead of constructing
    /// groups by hand.
    #[must_use]
    pub fn from_groups(groups: Vec<BuildGroup>, names: HashMap<RecipeId, String>) -> Self {
        let runtime_groups = groups
            .into_iter()
            .map(|group| match group {
                BuildGroup::Simple { members, on, by, priority } => {
                    GroupState::Simple(SimpleGroupState::new(&members, on, by, priority))
                }
                BuildGroup::Circular { order, .. } => GroupState::Circular(CircularGroupState::new(order)),
            })
            .collect::<Vec<_>>();

        let mut state = SchedulerState { groups: runtime_groups, current: 0 };
        state.advance_if_accomplished();

        tracing::debug!(groups = state.groups.len(), "schedule assembled");
        Self { state: Mutex::new(state), names }
    }

    /// Dispense up to `n` recipes currently `ready`.
    ///
    /// Within a Simple group, recipes are chosen by descending priority,
    /// then ascending name. A Circular group yields at most one recipe, and
    /// none if its one in-flight slot is occupied. Returns an empty vector,
    /// not an error, once the schedule is `Done`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidBatchSize` if `n` is `0` or greater
    /// than `99`.
    #[allow(clippy::missing_panics_doc)]
    pub fn next_batch(&self, n: usize) -> Result<Vec<RecipeId>, SchedulerError> {
        if n == 0 || n > MAX_BATCH_SIZE {
            return Err(SchedulerError::InvalidBatchSize(n));
        }

        let mut guard = self.state.lock().expect("scheduler mutex poisoned");
        if guard.is_done() {
            return Ok(Vec::new());
        }

        let names = &self.names;
        let current = guard.current;
        let dispensed = match guard.current_group_mut() {
            Some(GroupState::Simple(group)) => {
                let mut candidates: Vec<(RecipeId, i64)> = group
                    .state
                    .iter()
                    .filter(|(_, s)| **s == MemberState::Ready)
                    .map(|(&id, _)| (id, group.priority.get(&id).copied().unwrap_or(0)))
                    .collect();

                candidates.sort_by(|(a_id, a_pri), (b_id, b_pri)| {
                    b_pri
                        .cmp(a_pri)
                        .then_with(|| name_of(names, *a_id).cmp(name_of(names, *b_id)))
                });

                let chosen: Vec<RecipeId> = candidates.into_iter().take(n).map(|(id, _)| id).collect();
                for &id in &chosen {
                    let _ = group.state.insert(id, MemberState::Building);
                }
                chosen
            }
            Some(GroupState::Circular(group)) => {
                if group.in_flight || group.is_accomplished() {
                    Vec::new()
                } else {
                    group.in_flight = true;
                    vec![group.order[group.cursor]]
                }
            }
            None => Vec::new(),
        };

        tracing::debug!(group = current, dispensed = dispensed.len(), "next_batch");
        Ok(dispensed)
    }

    /// Record successful completion of `id`.
    ///
    /// Transitions it to `accomplished`, cascades waiting-set reductions to
    /// its in-group dependents, and advances the group pointer if this was
    /// the group's last outstanding member.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotDispatched` if `id` was not `building`.
    pub fn report_success(&self, id: RecipeId) -> Result<(), SchedulerError> {
        let mut guard = self.state.lock().expect("scheduler mutex poisoned");
        let current = guard.current;
        match guard.current_group_mut() {
            Some(GroupState::Simple(group)) => {
                match group.state.get(&id) {
                    Some(MemberState::Building) => {}
                    _ => return Err(SchedulerError::NotDispatched(id)),
                }
                let _ = group.state.insert(id, MemberState::Accomplished);

                if let Some(dependents) = group.by.get(&id).cloned() {
                    for dependent in dependents {
                        let still_waiting = match group.state.get_mut(&dependent) {
                            Some(MemberState::Waiting(waiting)) => {
                                let _ = waiting.remove(&id);
                                Some(waiting.is_empty())
                            }
                            _ => None,
                        };
                        if still_waiting == Some(true) {
                            let _ = group.state.insert(dependent, MemberState::Ready);
                        }
                    }
                }
            }
            Some(GroupState::Circular(group)) => {
                if !group.in_flight || group.order.get(group.cursor) != Some(&id) {
                    return Err(SchedulerError::NotDispatched(id));
                }
                group.in_flight = false;
                group.cursor += 1;
            }
            None => return Err(SchedulerError::NotDispatched(id)),
        }

        tracing::debug!(group = current, recipe = %name_of(&self.names, id), "report_success");
        guard.advance_if_accomplished();
        Ok(())
    }

    /// Record a failed attempt at `id`, returning it to the ready set
    /// (Simple groups) or re-heading it (Circular groups) with its original
    /// priority untouched.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotDispatched` if `id` was not `building`.
    pub fn report_failure(&self, id: RecipeId) -> Result<(), SchedulerError> {
        let mut guard = self.state.lock().expect("scheduler mutex poisoned");
        let current = guard.current;
        match guard.current_group_mut() {
            Some(GroupState::Simple(group)) => match group.state.get(&id) {
                Some(MemberState::Building) => {
                    let _ = group.state.insert(id, MemberState::Ready);
                }
                _ => return Err(SchedulerError::NotDispatched(id)),
            },
            Some(GroupState::Circular(group)) => {
                if !group.in_flight || group.order.get(group.cursor) != Some(&id) {
                    return Err(SchedulerError::NotDispatched(id));
                }
                group.in_flight = false;
            }
            None => return Err(SchedulerError::NotDispatched(id)),
        }

        tracing::debug!(group = current, recipe = %name_of(&self.names, id), "report_failure");
        Ok(())
    }

    /// Snapshot counts across the whole schedule and per-group.
    #[must_use]
    pub fn stats(&self) -> ScheduleStats {
        let guard = self.state.lock().expect("scheduler mutex poisoned");

        let groups: Vec<GroupStats> = guard.groups.iter().map(group_stats).collect();
        let overall = groups.iter().fold(GroupStats::default(), |mut acc, g| {
            acc += *g;
            acc
        });

        ScheduleStats { overall, groups, done: guard.is_done() }
    }

    /// `true` once every group has been accomplished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.lock().expect("scheduler mutex poisoned").is_done()
    }
}

fn name_of(names: &HashMap<RecipeId, String>, id: RecipeId) -> &str {
    names.get(&id).map(String::as_str).unwrap_or_default()
}

fn group_stats(group: &GroupState) -> GroupStats {
    match group {
        GroupState::Simple(g) => {
            let mut stats = GroupStats { total: g.state.len(), ..GroupStats::default() };
            for state in g.state.values() {
                match state {
                    MemberState::Waiting(_) => stats.waiting += 1,
                    MemberState::Ready => stats.ready += 1,
                    MemberState::Building => stats.building += 1,
                    MemberState::Accomplished => stats.accomplished += 1,
                }
            }
            stats
        }
        GroupState::Circular(g) => {
            let total = g.order.len();
            let accomplished = g.cursor.min(total);
            let building = usize::from(g.in_flight && g.cursor < total);
            let ready = usize::from(!g.in_flight && g.cursor < total);
            GroupStats {
                total,
                waiting: total - accomplished - building - ready,
                ready,
                building,
                accomplished,
            }
        }
    }
}
