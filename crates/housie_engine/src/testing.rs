//! Deterministic test doubles for driving an engine without a runtime.
//!
//! [`EngineHarness`] wires a [`GameEngine`] to a [`ManualClock`],
//! [`RecordingTimers`] and a [`RecordingBroadcaster`]. Firing a timer
//! advances the manual clock by exactly the armed delay, so a whole game can
//! be played out synchronously.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::events::{Broadcaster, GameEndEvent, GameEvent, WinnerEvent};
use crate::machine::GameEngine;
use crate::scheduler::{ScheduledTimer, TimerDriver, TimerPurpose};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jumps the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = lock(&self.now);
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).single().unwrap_or_default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// One arming seen by [`RecordingTimers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    /// Timer handed to the driver.
    pub timer: ScheduledTimer,
    /// Requested delay.
    pub delay: Duration,
}

#[derive(Debug, Default)]
struct TimerLog {
    pending: HashMap<TimerPurpose, ArmedTimer>,
    armed: Vec<ArmedTimer>,
    cancelled: Vec<TimerPurpose>,
}

/// Timer driver that records requests and never fires on its own.
///
/// Clones share the same log, so a test can keep one while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct RecordingTimers {
    log: Arc<Mutex<TimerLog>>,
}

impl RecordingTimers {
    /// Outstanding timer for `purpose`.
    pub fn pending(&self, purpose: TimerPurpose) -> Option<ArmedTimer> {
        lock(&self.log).pending.get(&purpose).copied()
    }

    /// Removes and returns the outstanding timer for `purpose`.
    pub fn take(&self, purpose: TimerPurpose) -> Option<ArmedTimer> {
        lock(&self.log).pending.remove(&purpose)
    }

    /// Every arming so far, in order.
    pub fn armed(&self) -> Vec<ArmedTimer> {
        lock(&self.log).armed.clone()
    }

    /// Every cancellation so far, in order.
    pub fn cancelled(&self) -> Vec<TimerPurpose> {
        lock(&self.log).cancelled.clone()
    }

    /// Number of outstanding timers across purposes.
    pub fn pending_count(&self) -> usize {
        lock(&self.log).pending.len()
    }
}

impl TimerDriver for RecordingTimers {
    fn arm(&mut self, timer: ScheduledTimer, delay: Duration) {
        let armed = ArmedTimer { timer, delay };
        let mut log = lock(&self.log);
        log.pending.insert(timer.purpose, armed);
        log.armed.push(armed);
    }

    fn cancel(&mut self, purpose: TimerPurpose) {
        let mut log = lock(&self.log);
        log.pending.remove(&purpose);
        log.cancelled.push(purpose);
    }
}

/// Broadcaster that keeps every event.
#[derive(Debug, Clone, Default)]
pub struct RecordingBroadcaster {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl RecordingBroadcaster {
    /// All events, oldest first.
    pub fn events(&self) -> Vec<GameEvent> {
        lock(&self.events).clone()
    }

    /// Number of events so far.
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// True if nothing was published.
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    /// Winner events only.
    pub fn winners(&self) -> Vec<WinnerEvent> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                GameEvent::Winner(winner) => Some(winner.clone()),
                _ => None,
            })
            .collect()
    }

    /// Game-end events only.
    pub fn game_ends(&self) -> Vec<GameEndEvent> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                GameEvent::GameEnded(end) => Some(end.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, event: GameEvent) {
        lock(&self.events).push(event);
    }
}

/// An engine wired to manual time, recorded timers and recorded events.
pub struct EngineHarness {
    /// Engine under test.
    pub engine: GameEngine,
    /// Its clock.
    pub clock: ManualClock,
    /// Its timer driver.
    pub timers: RecordingTimers,
    /// Its broadcaster.
    pub events: RecordingBroadcaster,
}

impl EngineHarness {
    /// Builds a harness around a fresh engine.
    pub fn new(config: EngineConfig) -> Self {
        let clock = ManualClock::default();
        let timers = RecordingTimers::default();
        let events = RecordingBroadcaster::default();
        let engine = GameEngine::new(
            config,
            Arc::new(clock.clone()),
            Box::new(timers.clone()),
            Arc::new(events.clone()),
        );
        Self {
            engine,
            clock,
            timers,
            events,
        }
    }

    /// Lets the outstanding `purpose` timer elapse and delivers it.
    ///
    /// Returns false when no such timer is outstanding.
    pub fn fire(&mut self, purpose: TimerPurpose) -> bool {
        match self.timers.take(purpose) {
            Some(armed) => {
                self.clock.advance(armed.delay);
                self.engine.on_timer(armed.timer);
                true
            }
            None => false,
        }
    }

    /// Fires timers until none remain or `max_fires` is reached; returns the
    /// number fired.
    pub fn run_until_idle(&mut self, max_fires: usize) -> usize {
        let mut fired = 0;
        while fired < max_fires {
            let progressed = self.fire(TimerPurpose::CountdownExpiry)
                || self.fire(TimerPurpose::NextDraw);
            if !progressed {
                break;
            }
            fired += 1;
        }
        fired
    }
}
