//! Lifecycle control for the autonomous node and channel tasks.
//!
//! Each task owns a [`TaskSlot`]. Starting is idempotent and stopping is
//! cooperative: the task checks its slot at the top of every loop iteration,
//! so it may finish the cycle it is in (including its timed wait) before it
//! exits. [`TaskSlot::halt`] is the only preemptive path and is reserved for
//! removing a task's owner from the topology.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// What a task should do at the top of its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPoll {
    /// Keep doing full cycles.
    Run,
    /// Stop requested, but work is still in flight. Finish it without
    /// taking on more.
    Drain,
    /// Leave the loop. The slot is already marked as not running.
    Exit,
}

#[derive(Debug, Default)]
struct SlotState {
    /// The owner asked for the task to be active.
    requested: bool,
    /// A task is alive and will observe `requested` again.
    running: bool,
    handle: Option<JoinHandle<()>>,
}

/// Control record for one autonomous task.
#[derive(Debug, Default)]
pub struct TaskSlot {
    state: Mutex<SlotState>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the slot active, spawning the task via `spawn` only when none is
    /// alive. Returns `false` if the slot was already active.
    ///
    /// A task that was stopped but has not yet exited is re-armed rather
    /// than replaced.
    pub fn start(&self, spawn: impl FnOnce() -> JoinHandle<()>) -> bool {
        let mut state = self.state.lock();
        if state.requested {
            return false;
        }
        state.requested = true;
        if !state.running {
            state.running = true;
            state.handle = Some(spawn());
        }
        true
    }

    /// Ask the task to stop. Returns `false` if it was not active.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        std::mem::replace(&mut state.requested, false)
    }

    /// Stop and abort the task immediately. Used when the owner is being
    /// removed from the topology.
    pub fn halt(&self) {
        let mut state = self.state.lock();
        state.requested = false;
        state.running = false;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
    }

    /// Whether the task is requested to be active.
    pub fn is_active(&self) -> bool {
        self.state.lock().requested
    }

    /// Whether a task is still alive, possibly finishing a final cycle.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Evaluate at the loop head. `drained` reports whether the task has no
    /// work left in flight; it is checked under the slot lock so a racing
    /// `start` either sees the task alive or spawns a fresh one.
    pub fn poll(&self, drained: impl FnOnce() -> bool) -> TaskPoll {
        let mut state = self.state.lock();
        if state.requested {
            TaskPoll::Run
        } else if drained() {
            state.running = false;
            state.handle = None;
            TaskPoll::Exit
        } else {
            TaskPoll::Drain
        }
    }
}

/// Suspend for `duration`. A zero duration still yields once, so a
/// zero-interval loop cannot monopolise the scheduler.
pub async fn pause(duration: Duration) {
    if duration.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(duration).await;
    }
}
