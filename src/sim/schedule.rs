//! Timer scheduling for auto-play
//!
//! The engine never sleeps. It asks a [`Scheduler`] for a delayed wakeup and
//! is told later, through `fire(timer)`, that the wakeup is due. Hosts map this
//! onto `setTimeout` or a runtime timer; tests and the headless runner use
//! [`VirtualClock`], which only moves when told to.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::level::GameMode;
use crate::consts::{
    EQUATION_MIN_TICK_MS, EQUATION_SETTLE_DELAY_MS, MAX_SPEED, MIN_TICK_DELAY_MS,
    MS_PER_SPEED_UNIT, SCAN_MIN_TICK_MS, SETTLE_DELAY_MS,
};

/// Handle for a scheduled wakeup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

pub trait Scheduler {
    /// Arrange for `fire(id)` to be delivered after `delay`
    fn schedule(&mut self, delay: Duration) -> TimerId;

    /// Forget a timer. Unknown or already-fired ids are ignored.
    fn cancel(&mut self, timer: TimerId);
}

/// Deterministic scheduler with a virtual clock.
///
/// Due timers are ordered by wakeup time, then by id, so timers scheduled
/// for the same instant fire in scheduling order.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Duration,
    next_id: u64,
    queue: BTreeSet<(Duration, TimerId)>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Jump to the earliest timer and hand it out
    pub fn pop_next(&mut self) -> Option<TimerId> {
        let (at, timer) = self.queue.pop_first()?;
        self.now = self.now.max(at);
        Some(timer)
    }

    /// Move time forward, returning every timer that came due in order
    pub fn advance(&mut self, by: Duration) -> Vec<TimerId> {
        self.now += by;
        let mut due = Vec::new();
        while let Some(&(at, timer)) = self.queue.first() {
            if at > self.now {
                break;
            }
            self.queue.pop_first();
            due.push(timer);
        }
        due
    }
}

impl Scheduler for VirtualClock {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let timer = TimerId(self.next_id);
        self.queue.insert((self.now + delay, timer));
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        self.queue.retain(|&(_, id)| id != timer);
    }
}

/// Delay before the next auto-play tick.
///
/// `max(5ms, (100 - speed) * 10ms)`, held to 2.5s per step in equation mode
/// and 500ms after a `SCAN` so its sweep can finish.
pub fn tick_delay(speed: u8, mode: GameMode, last_action: Option<&Action>) -> Duration {
    let speed = u64::from(speed.min(MAX_SPEED));
    let mut ms = ((u64::from(MAX_SPEED) - speed) * MS_PER_SPEED_UNIT).max(MIN_TICK_DELAY_MS);
    if mode == GameMode::Equation {
        ms = ms.max(EQUATION_MIN_TICK_MS);
    }
    if last_action.is_some_and(Action::is_scan) {
        ms = ms.max(SCAN_MIN_TICK_MS);
    }
    Duration::from_millis(ms)
}

/// Delay between reaching a win or verdict and announcing it
pub fn settle_delay(mode: GameMode) -> Duration {
    match mode {
        GameMode::Equation => Duration::from_millis(EQUATION_SETTLE_DELAY_MS),
        _ => Duration::from_millis(SETTLE_DELAY_MS),
    }
}
