//! Countdown expiry and the drift-correcting draw loop.
//!
//! The engine never sleeps. It asks a [`TimerDriver`] to deliver a
//! [`ScheduledTimer`] back after a delay, and the driver's owner hands the
//! timer to [`GameEngine::on_timer`]. Each armed timer carries a fresh
//! [`TimerToken`]; only the token currently armed for a purpose is honored,
//! so a timer that was already in flight when it got cancelled is dropped
//! on arrival.

use crate::clock::Clock;
use crate::events::{Broadcaster, GameEndEvent, GameEvent};
use crate::invariants::assert_invariants;
use crate::machine::GameEngine;
use crate::sequence::DrawSequence;
use crate::state::{GameEndReason, GameState, GameStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, trace};

/// What a timer is counting down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum TimerPurpose {
    /// Countdown elapsed; the game should start running.
    CountdownExpiry,
    /// The next number is due.
    NextDraw,
}

/// Identifies one arming of a timer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct TimerToken(u64);

/// A timer the engine wants delivered back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct ScheduledTimer {
    /// Why the timer exists.
    pub purpose: TimerPurpose,
    /// Arming that produced it.
    pub token: TimerToken,
}

/// Single-shot delayed delivery of [`ScheduledTimer`]s.
///
/// When the delay elapses the implementation must route the timer to
/// [`GameEngine::on_timer`] on the same thread of control that runs every
/// other engine operation.
pub trait TimerDriver: Send {
    /// Schedules `timer` to fire after `delay`.
    fn arm(&mut self, timer: ScheduledTimer, delay: Duration);

    /// Best-effort cancellation of the outstanding timer for `purpose`.
    ///
    /// A timer that fires anyway is rejected by its stale token.
    fn cancel(&mut self, purpose: TimerPurpose);
}

/// The armed token per purpose; at most one of each is outstanding.
#[derive(Debug, Default)]
pub(crate) struct TimerSlots {
    next_token: u64,
    countdown: Option<TimerToken>,
    draw: Option<TimerToken>,
}

impl TimerSlots {
    fn slot(&mut self, purpose: TimerPurpose) -> &mut Option<TimerToken> {
        match purpose {
            TimerPurpose::CountdownExpiry => &mut self.countdown,
            TimerPurpose::NextDraw => &mut self.draw,
        }
    }

    /// Arms a fresh timer, cancelling the previous one for the same purpose.
    pub(crate) fn arm(
        &mut self,
        purpose: TimerPurpose,
        delay: Duration,
        driver: &mut dyn TimerDriver,
    ) -> ScheduledTimer {
        self.cancel(purpose, driver);
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        *self.slot(purpose) = Some(token);
        let timer = ScheduledTimer::new(purpose, token);
        trace!(%purpose, %token, ?delay, "Arming timer");
        driver.arm(timer, delay);
        timer
    }

    pub(crate) fn cancel(&mut self, purpose: TimerPurpose, driver: &mut dyn TimerDriver) {
        if let Some(token) = self.slot(purpose).take() {
            trace!(%purpose, %token, "Cancelling timer");
            driver.cancel(purpose);
        }
    }

    pub(crate) fn cancel_all(&mut self, driver: &mut dyn TimerDriver) {
        self.cancel(TimerPurpose::CountdownExpiry, driver);
        self.cancel(TimerPurpose::NextDraw, driver);
    }

    /// Consumes the slot if `timer` is the one currently armed.
    pub(crate) fn take_if_current(&mut self, timer: ScheduledTimer) -> bool {
        let slot = self.slot(timer.purpose);
        if *slot == Some(timer.token) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn outstanding(&self, purpose: TimerPurpose) -> Option<TimerToken> {
        match purpose {
            TimerPurpose::CountdownExpiry => self.countdown,
            TimerPurpose::NextDraw => self.draw,
        }
    }
}

/// Outcome of checking whether the draw loop may continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawDecision {
    /// Not running any more; stop without side effects.
    Stop,
    /// The game must end for this reason.
    End(GameEndReason),
    /// Call this number next.
    Call(u8),
}

/// Cadence and termination rules for the draw loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawScheduler {
    cadence: Duration,
}

impl DrawScheduler {
    /// Creates a scheduler targeting one call per `cadence`.
    pub fn new(cadence: Duration) -> Self {
        Self { cadence }
    }

    /// Target time between calls.
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Termination checks, in priority order.
    pub fn decide(&self, state: &GameState) -> DrawDecision {
        if *state.status() != GameStatus::Running {
            DrawDecision::Stop
        } else if state.ranks_exhausted() {
            DrawDecision::End(GameEndReason::FullHousieComplete)
        } else {
            match state.next_number() {
                Some(number) => DrawDecision::Call(number),
                None => DrawDecision::End(GameEndReason::SequenceComplete),
            }
        }
    }

    /// Delay until the next call: `max(0, cadence - (now - last_call))`.
    ///
    /// A missing or future `last_call` counts as no time elapsed.
    pub fn next_delay(&self, last_call: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        let elapsed = last_call
            .and_then(|last| (now - last).to_std().ok())
            .unwrap_or_default();
        self.cadence.saturating_sub(elapsed)
    }
}

impl GameEngine {
    /// Delivers a fired timer.
    ///
    /// Stale timers (cancelled or superseded) are ignored, and a current one
    /// re-validates the game status before acting.
    #[instrument(skip(self), fields(status = %self.state.status))]
    pub fn on_timer(&mut self, timer: ScheduledTimer) {
        if !self.timers.take_if_current(timer) {
            debug!(purpose = %timer.purpose, token = %timer.token, "Ignoring stale timer");
            return;
        }
        match timer.purpose {
            TimerPurpose::CountdownExpiry => self.begin_running(),
            TimerPurpose::NextDraw => self.call_next_number(),
        }
    }

    /// Token currently armed for `purpose`, if any.
    pub fn outstanding_timer(&self, purpose: TimerPurpose) -> Option<TimerToken> {
        self.timers.outstanding(purpose)
    }

    fn begin_running(&mut self) {
        if self.state.status != GameStatus::Countdown {
            debug!(status = %self.state.status, "Countdown expired outside COUNTDOWN, ignoring");
            return;
        }

        if self.state.draw_sequence.is_empty() && *self.config.auto_sequence() {
            info!("No draw sequence supplied, shuffling 1-90");
            self.state.draw_sequence = DrawSequence::shuffled(&mut self.sequence_rng);
        }

        let now = self.clock.now();
        self.state.status = GameStatus::Running;
        self.state.started_at = Some(now);
        self.state.last_call_time = Some(now);
        self.state.draw_index = 0;
        self.state.called_numbers.clear();
        info!(
            sequence_len = self.state.draw_sequence.len(),
            booked = self.state.booked_count(),
            "Game running"
        );

        assert_invariants(&self.state);
        self.publish_snapshot();
        self.schedule_next_draw();
    }

    /// Arms the next draw or ends the game, whichever the state calls for.
    fn schedule_next_draw(&mut self) {
        match self.scheduler.decide(&self.state) {
            DrawDecision::Stop => {
                self.timers.cancel(TimerPurpose::NextDraw, self.driver.as_mut());
            }
            DrawDecision::End(reason) => self.end_game(reason),
            DrawDecision::Call(_) => {
                let delay = self
                    .scheduler
                    .next_delay(self.state.last_call_time, self.clock.now());
                self.timers
                    .arm(TimerPurpose::NextDraw, delay, self.driver.as_mut());
            }
        }
    }

    fn call_next_number(&mut self) {
        let number = match self.scheduler.decide(&self.state) {
            DrawDecision::Stop => {
                debug!(status = %self.state.status, "Draw fired outside RUNNING, stopping");
                return;
            }
            DrawDecision::End(reason) => {
                self.end_game(reason);
                return;
            }
            DrawDecision::Call(number) => number,
        };

        let now = self.clock.now();
        self.state.called_numbers.push(number);
        self.state.draw_index += 1;
        self.state.last_call_time = Some(now);
        debug!(number, draw_index = self.state.draw_index, "Number called");

        for event in self.evaluator.evaluate(&mut self.state, now) {
            self.broadcaster.publish(GameEvent::Winner(event));
        }

        if self.state.ranks_exhausted() {
            self.end_game(GameEndReason::FullHousieComplete);
            return;
        }

        assert_invariants(&self.state);
        self.publish_snapshot();
        self.schedule_next_draw();
    }

    /// Moves to `COMPLETED` and silences every timer.
    pub(crate) fn end_game(&mut self, reason: GameEndReason) {
        let now = self.clock.now();
        self.state.status = GameStatus::Completed;
        self.state.ended_at = Some(now);
        self.state.game_end_reason = Some(reason);
        self.timers.cancel_all(self.driver.as_mut());
        info!(
            %reason,
            winners = self.state.winners.len(),
            called = self.state.called_numbers.len(),
            "Game completed"
        );

        assert_invariants(&self.state);
        self.broadcaster.publish(GameEvent::GameEnded(GameEndEvent::new(
            reason,
            self.state.winners.clone(),
            self.state.called_numbers.len(),
            now,
        )));
        self.publish_snapshot();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[derive(Default)]
    struct CountingDriver {
        armed: Vec<ScheduledTimer>,
        cancelled: Vec<TimerPurpose>,
    }

    impl TimerDriver for CountingDriver {
        fn arm(&mut self, timer: ScheduledTimer, _delay: Duration) {
            self.armed.push(timer);
        }

        fn cancel(&mut self, purpose: TimerPurpose) {
            self.cancelled.push(purpose);
        }
    }

    #[test]
    fn test_next_delay_subtracts_elapsed() {
        let scheduler = DrawScheduler::new(Duration::from_secs(6));
        let last = DateTime::<Utc>::UNIX_EPOCH;
        let now = last + TimeDelta::milliseconds(1_500);
        assert_eq!(scheduler.next_delay(Some(last), now), Duration::from_millis(4_500));
    }

    #[test]
    fn test_next_delay_saturates_when_late() {
        let scheduler = DrawScheduler::new(Duration::from_secs(6));
        let last = DateTime::<Utc>::UNIX_EPOCH;
        let now = last + TimeDelta::seconds(9);
        assert_eq!(scheduler.next_delay(Some(last), now), Duration::ZERO);
    }

    #[test]
    fn test_next_delay_without_last_call_is_full_cadence() {
        let scheduler = DrawScheduler::new(Duration::from_secs(6));
        let now = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(scheduler.next_delay(None, now), Duration::from_secs(6));
        let future = now + TimeDelta::seconds(1);
        assert_eq!(scheduler.next_delay(Some(future), now), Duration::from_secs(6));
    }

    #[test]
    fn test_decide_priority() {
        let scheduler = DrawScheduler::new(Duration::from_secs(1));
        let mut state = GameState::new(1);
        assert_eq!(scheduler.decide(&state), DrawDecision::Stop);

        state.status = GameStatus::Running;
        assert_eq!(
            scheduler.decide(&state),
            DrawDecision::End(GameEndReason::SequenceComplete)
        );

        state.draw_sequence = DrawSequence::from_values(&[42]).expect("valid sequence");
        assert_eq!(scheduler.decide(&state), DrawDecision::Call(42));

        state.current_prize_rank = 1;
        assert_eq!(
            scheduler.decide(&state),
            DrawDecision::End(GameEndReason::FullHousieComplete)
        );
    }

    #[test]
    fn test_rearm_cancels_previous() {
        let mut slots = TimerSlots::default();
        let mut driver = CountingDriver::default();

        let first = slots.arm(TimerPurpose::CountdownExpiry, Duration::ZERO, &mut driver);
        let second = slots.arm(TimerPurpose::CountdownExpiry, Duration::ZERO, &mut driver);

        assert_ne!(first.token, second.token);
        assert_eq!(driver.cancelled, vec![TimerPurpose::CountdownExpiry]);
        assert!(!slots.take_if_current(first));
        assert!(slots.take_if_current(second));
        assert!(!slots.take_if_current(second));
    }

    #[test]
    fn test_purposes_are_independent() {
        let mut slots = TimerSlots::default();
        let mut driver = CountingDriver::default();

        let countdown = slots.arm(TimerPurpose::CountdownExpiry, Duration::ZERO, &mut driver);
        slots.arm(TimerPurpose::NextDraw, Duration::ZERO, &mut driver);
        assert!(driver.cancelled.is_empty());

        slots.cancel_all(&mut driver);
        assert_eq!(driver.cancelled.len(), 2);
        assert_eq!(slots.outstanding(TimerPurpose::NextDraw), None);
        assert!(!slots.take_if_current(countdown));
        assert_eq!(driver.armed.len(), 2);
    }
}
