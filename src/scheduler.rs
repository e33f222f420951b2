//! The execution scheduler: per-module state machine and rank-0
//! ranksStarted/ranksFinished bookkeeping (§4.7).

use std::collections::HashMap;

use crate::id::Id;
use crate::port::ReducePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    Prepared,
    Computing,
    Reducing,
    Finished,
    Killed,
}

/// Emitted as a transition's side effect; the cluster manager turns
/// these into actual outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    ExecutionProgressStart,
    ExecutionProgressFinish,
    ReduceBroadcast,
}

/// One module's execution state machine (§4.7). The reduce policy is
/// snapshotted when `Prepare` fires and held fixed for the rest of the
/// execution — see `SPEC_FULL.md` §13 for why a policy change
/// mid-flight must not retroactively alter a run already in progress.
pub struct ModuleScheduler {
    state: ExecState,
    reduce_policy: ReducePolicy,
}

impl ModuleScheduler {
    pub fn new() -> Self {
        Self { state: ExecState::Idle, reduce_policy: ReducePolicy::Never }
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    /// Idle → Prepared on `Execute(Prepare)` (§4.7).
    pub fn on_prepare(&mut self, reduce_policy: ReducePolicy) -> Vec<SchedulerEvent> {
        if self.state != ExecState::Idle {
            return Vec::new();
        }
        self.reduce_policy = reduce_policy;
        self.state = ExecState::Prepared;
        vec![SchedulerEvent::ExecutionProgressStart]
    }

    /// Prepared → Computing on the first `Execute(ComputeObject)`.
    pub fn on_compute_object(&mut self) {
        if self.state == ExecState::Prepared {
            self.state = ExecState::Computing;
        }
    }

    /// Every rank reported `ExecutionProgress(Finish)`. Computing →
    /// Reducing if the policy allows a reduce, else straight to
    /// Finished.
    pub fn on_all_ranks_finished(&mut self) -> Vec<SchedulerEvent> {
        if self.state != ExecState::Computing {
            return Vec::new();
        }
        if matches!(self.reduce_policy, ReducePolicy::Never) {
            self.state = ExecState::Finished;
            vec![SchedulerEvent::ExecutionProgressFinish]
        } else {
            self.state = ExecState::Reducing;
            vec![SchedulerEvent::ReduceBroadcast]
        }
    }

    /// Reducing → Finished once the `Reduce` broadcast completes.
    pub fn on_reduce_complete(&mut self) -> Vec<SchedulerEvent> {
        if self.state != ExecState::Reducing {
            return Vec::new();
        }
        self.state = ExecState::Finished;
        vec![SchedulerEvent::ExecutionProgressFinish]
    }

    /// Any state → Killed on `Kill`.
    pub fn on_kill(&mut self) {
        self.state = ExecState::Killed;
    }

    pub fn reset(&mut self) {
        self.state = ExecState::Idle;
    }
}

impl Default for ModuleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Rank-0-only counters gating `Reduce` emission and the terminal
/// `ExecutionProgress(Finish)` forwarded downstream (§4.7).
#[derive(Debug, Default)]
struct RankCounters {
    total_ranks: u32,
    started: u32,
    finished: u32,
}

pub struct RankTracker {
    counters: HashMap<Id, RankCounters>,
}

impl RankTracker {
    pub fn new() -> Self {
        Self { counters: HashMap::new() }
    }

    pub fn begin(&mut self, module: Id, total_ranks: u32) {
        self.counters.insert(module, RankCounters { total_ranks, started: 0, finished: 0 });
    }

    /// Returns true the moment every rank has reported start.
    pub fn rank_started(&mut self, module: Id) -> bool {
        let Some(c) = self.counters.get_mut(&module) else { return false };
        c.started += 1;
        c.started >= c.total_ranks
    }

    /// Returns true the moment every rank has reported finish.
    pub fn rank_finished(&mut self, module: Id) -> bool {
        let Some(c) = self.counters.get_mut(&module) else { return false };
        c.finished += 1;
        c.finished >= c.total_ranks
    }
}

impl Default for RankTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_with_a_reducing_policy() {
        let mut s = ModuleScheduler::new();
        assert_eq!(s.on_prepare(ReducePolicy::PerTimestep), vec![SchedulerEvent::ExecutionProgressStart]);
        assert_eq!(s.state(), ExecState::Prepared);

        s.on_compute_object();
        assert_eq!(s.state(), ExecState::Computing);

        assert_eq!(s.on_all_ranks_finished(), vec![SchedulerEvent::ReduceBroadcast]);
        assert_eq!(s.state(), ExecState::Reducing);

        assert_eq!(s.on_reduce_complete(), vec![SchedulerEvent::ExecutionProgressFinish]);
        assert_eq!(s.state(), ExecState::Finished);
    }

    #[test]
    fn never_policy_skips_reducing_entirely() {
        let mut s = ModuleScheduler::new();
        s.on_prepare(ReducePolicy::Never);
        s.on_compute_object();
        assert_eq!(s.on_all_ranks_finished(), vec![SchedulerEvent::ExecutionProgressFinish]);
        assert_eq!(s.state(), ExecState::Finished);
    }

    #[test]
    fn kill_overrides_any_state() {
        let mut s = ModuleScheduler::new();
        s.on_prepare(ReducePolicy::PerTimestep);
        s.on_kill();
        assert_eq!(s.state(), ExecState::Killed);
    }

    #[test]
    fn rank_tracker_fires_only_once_every_rank_has_reported() {
        let mut t = RankTracker::new();
        t.begin(1, 3);
        assert!(!t.rank_started(1));
        assert!(!t.rank_started(1));
        assert!(t.rank_started(1));
    }
}
