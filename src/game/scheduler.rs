//! Cancellable timer tasks resumed once per simulation tick
//!
//! Every countdown in a match (preparation, turn, flight, hold, round
//! reset) is a task here. Tasks are keyed by a `TaskId`; cancelling removes
//! the task outright so it can never fire into a later phase.

use tracing::trace;

/// Cancellation token for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone)]
struct ScheduledTask<K> {
    id: TaskId,
    kind: K,
    remaining_ticks: u64,
}

/// Tick-driven task scheduler
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    next_id: u64,
    tasks: Vec<ScheduledTask<K>>,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            next_id: 1,
            tasks: Vec::new(),
        }
    }
}

impl<K: Copy + PartialEq + std::fmt::Debug> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire on the `ticks`-th call to `advance`
    /// (at least the next one).
    pub fn schedule(&mut self, kind: K, ticks: u64) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(ScheduledTask {
            id,
            kind,
            remaining_ticks: ticks.max(1),
        });
        trace!(?kind, ticks, "Task scheduled");
        id
    }

    /// Cancel a task; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        before != self.tasks.len()
    }

    /// Cancel every pending task of `kind`
    pub fn cancel_kind(&mut self, kind: K) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.kind != kind);
        before - self.tasks.len()
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Ticks left before `id` fires
    pub fn remaining(&self, id: TaskId) -> Option<u64> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.remaining_ticks)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resume every task by one tick, returning those that fired in
    /// scheduling order. Fired tasks are removed.
    pub fn advance(&mut self) -> Vec<(TaskId, K)> {
        let mut fired = Vec::new();
        self.tasks.retain_mut(|task| {
            task.remaining_ticks -= 1;
            if task.remaining_ticks == 0 {
                fired.push((task.id, task.kind));
                false
            } else {
                true
            }
        });
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        A,
        B,
    }

    #[test]
    fn fires_on_exact_tick() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(Kind::A, 3);
        assert!(scheduler.advance().is_empty());
        assert!(scheduler.advance().is_empty());
        assert_eq!(scheduler.remaining(id), Some(1));
        assert_eq!(scheduler.advance(), vec![(id, Kind::A)]);
        assert!(!scheduler.is_pending(id));
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(Kind::A, 1);
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(scheduler.advance().is_empty());
    }

    #[test]
    fn cancel_kind_only_touches_that_kind() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Kind::A, 2);
        scheduler.schedule(Kind::A, 5);
        let b = scheduler.schedule(Kind::B, 2);
        assert_eq!(scheduler.cancel_kind(Kind::A), 2);
        scheduler.advance();
        assert_eq!(scheduler.advance(), vec![(b, Kind::B)]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn zero_tick_schedule_fires_next_advance() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(Kind::B, 0);
        assert_eq!(scheduler.advance(), vec![(id, Kind::B)]);
    }
}
