//! The game state machine: every host and player operation.
//!
//! Each operation runs its guards against the current state first and only
//! then mutates, so a rejected operation leaves the game untouched. Success
//! is followed by an invariant check and a snapshot to the broadcaster.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{GameError, GuardViolation, ValidationError};
use crate::events::{Broadcaster, GameEvent};
use crate::generator::TicketGenerator;
use crate::invariants::assert_invariants;
use crate::scheduler::{DrawScheduler, TimerDriver, TimerPurpose, TimerSlots};
use crate::sequence::DrawSequence;
use crate::state::{GameState, GameStatus};
use crate::ticket::{Ticket, TicketId};
use crate::winner::WinnerEvaluator;
use chrono::TimeDelta;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Who is performing an operation.
///
/// The engine never checks credentials; the transport decides whether the
/// caller is the host and passes that fact along.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actor {
    privileged: bool,
}

impl Actor {
    /// Actor with the given privilege.
    pub fn new(privileged: bool) -> Self {
        Self { privileged }
    }

    /// The host.
    pub fn host() -> Self {
        Self::new(true)
    }

    /// Any player.
    pub fn player() -> Self {
        Self::new(false)
    }

    /// True for the host.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }
}

/// Owns one game session and drives it through its lifecycle.
pub struct GameEngine {
    pub(crate) config: EngineConfig,
    pub(crate) state: GameState,
    pub(crate) generator: TicketGenerator,
    pub(crate) evaluator: WinnerEvaluator,
    pub(crate) scheduler: DrawScheduler,
    pub(crate) timers: TimerSlots,
    pub(crate) driver: Box<dyn TimerDriver>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) broadcaster: Arc<dyn Broadcaster>,
    pub(crate) sequence_rng: StdRng,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("config", &self.config)
            .field("status", &self.state.status)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl GameEngine {
    /// Creates an engine in `NO_ACTIVE_GAME`.
    ///
    /// With `ticket_seed` set, tickets and auto-shuffled sequences are
    /// reproducible.
    #[instrument(skip_all)]
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        driver: Box<dyn TimerDriver>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        let config = config.normalized();
        let (generator, sequence_rng) = match *config.ticket_seed() {
            Some(seed) => (
                TicketGenerator::seeded(seed),
                StdRng::seed_from_u64(seed.rotate_left(32)),
            ),
            None => (TicketGenerator::from_os_rng(), StdRng::from_os_rng()),
        };
        let evaluator = WinnerEvaluator::new(*config.tie_policy());
        let scheduler = DrawScheduler::new(config.call_interval());
        info!(
            cadence_ms = scheduler.cadence().as_millis() as u64,
            max_prize_ranks = *config.max_prize_ranks(),
            tie_policy = %evaluator.policy(),
            "Game engine ready"
        );

        Self {
            state: GameState::new(*config.max_prize_ranks()),
            evaluator,
            scheduler,
            generator,
            timers: TimerSlots::default(),
            driver,
            clock,
            broadcaster,
            sequence_rng,
            config,
        }
    }

    /// Current state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Tickets that fell back to the fixed layout since the engine started.
    pub fn generation_fallbacks(&self) -> usize {
        self.generator.fallback_count()
    }

    /// Deals `ticket_count` fresh tickets and opens booking.
    ///
    /// # Errors
    ///
    /// Host only, from `NO_ACTIVE_GAME`, with `1 <= ticket_count <= max_tickets`.
    #[instrument(skip(self), fields(status = %self.state.status))]
    pub fn create_game(&mut self, actor: Actor, ticket_count: usize) -> Result<(), GameError> {
        self.apply("createGame", |engine| {
            require_host(actor, "createGame")?;
            let max = *engine.config.max_tickets();
            if ticket_count == 0 || ticket_count > max {
                return Err(ValidationError::TicketCountOutOfRange {
                    requested: ticket_count,
                    max,
                }
                .into());
            }
            require_status(&engine.state, "createGame", &[GameStatus::NoActiveGame])?;

            let mut state = GameState::new(*engine.config.max_prize_ranks());
            state.tickets = engine.generator.generate_batch(ticket_count);
            state.status = GameStatus::BookingOpen;
            state.created_at = Some(engine.clock.now());
            engine.state = state;
            info!(ticket_count, "Game created, booking open");
            Ok(())
        })
    }

    /// Replaces the draw sequence.
    ///
    /// Accepts anything convertible into a [`DrawSequence`], e.g. a
    /// `Vec<i64>` or a `&str` like `"5, 17, 90"`.
    ///
    /// # Errors
    ///
    /// Host only, while `BOOKING_OPEN` or `COUNTDOWN`. Invalid input leaves
    /// the current sequence unchanged.
    #[instrument(skip(self, sequence), fields(status = %self.state.status))]
    pub fn set_draw_sequence<S>(&mut self, actor: Actor, sequence: S) -> Result<(), GameError>
    where
        S: TryInto<DrawSequence>,
        GameError: From<S::Error>,
    {
        self.apply("setDrawSequence", |engine| {
            require_host(actor, "setDrawSequence")?;
            let sequence: DrawSequence = sequence.try_into()?;
            require_status(
                &engine.state,
                "setDrawSequence",
                &[GameStatus::BookingOpen, GameStatus::Countdown],
            )?;

            info!(len = sequence.len(), "Draw sequence replaced");
            engine.state.draw_sequence = sequence;
            engine.state.draw_index = 0;
            Ok(())
        })
    }

    /// Books a free ticket for `player_name`.
    #[instrument(skip(self), fields(status = %self.state.status, ticket_id = %ticket_id))]
    pub fn book_ticket(
        &mut self,
        _actor: Actor,
        ticket_id: &TicketId,
        player_name: &str,
    ) -> Result<(), GameError> {
        self.apply("bookTicket", |engine| {
            let name = player_name_of(player_name)?;
            require_status(&engine.state, "bookTicket", &[GameStatus::BookingOpen])?;
            let ticket = engine.eligible_ticket(ticket_id)?;
            ensure_free(ticket)?;

            engine.ticket_mut(ticket_id)?.book(name);
            info!(player = player_name.trim(), "Ticket booked");
            Ok(())
        })
    }

    /// Renames the player on a booked ticket.
    #[instrument(skip(self), fields(status = %self.state.status, ticket_id = %ticket_id))]
    pub fn edit_booking(
        &mut self,
        _actor: Actor,
        ticket_id: &TicketId,
        new_name: &str,
    ) -> Result<(), GameError> {
        self.apply("editBooking", |engine| {
            let name = player_name_of(new_name)?;
            require_status(&engine.state, "editBooking", &[GameStatus::BookingOpen])?;
            let ticket = engine.eligible_ticket(ticket_id)?;
            if !ticket.is_booked {
                return Err(GuardViolation::NotBooked(ticket_id.clone()).into());
            }

            engine.ticket_mut(ticket_id)?.booked_by = Some(name);
            info!(player = new_name.trim(), "Booking renamed");
            Ok(())
        })
    }

    /// Frees a booked ticket.
    #[instrument(skip(self), fields(status = %self.state.status, ticket_id = %ticket_id))]
    pub fn unbook_ticket(&mut self, _actor: Actor, ticket_id: &TicketId) -> Result<(), GameError> {
        self.apply("unbookTicket", |engine| {
            require_status(&engine.state, "unbookTicket", &[GameStatus::BookingOpen])?;
            let ticket = engine.eligible_ticket(ticket_id)?;
            if !ticket.is_booked {
                return Err(GuardViolation::NotBooked(ticket_id.clone()).into());
            }

            engine.ticket_mut(ticket_id)?.release();
            info!("Ticket released");
            Ok(())
        })
    }

    /// Asks the host to book a ticket for `player_name`.
    #[instrument(skip(self), fields(status = %self.state.status, ticket_id = %ticket_id))]
    pub fn request_pending_booking(
        &mut self,
        _actor: Actor,
        ticket_id: &TicketId,
        player_name: &str,
    ) -> Result<(), GameError> {
        self.apply("requestPendingBooking", |engine| {
            let name = player_name_of(player_name)?;
            require_status(&engine.state, "requestPendingBooking", &[GameStatus::BookingOpen])?;
            let ticket = engine.eligible_ticket(ticket_id)?;
            ensure_free(ticket)?;

            let ticket = engine.ticket_mut(ticket_id)?;
            ticket.is_pending = true;
            ticket.pending_player_name = Some(name);
            info!(player = player_name.trim(), "Pending booking requested");
            Ok(())
        })
    }

    /// Turns a pending request into a booking.
    #[instrument(skip(self), fields(status = %self.state.status, ticket_id = %ticket_id))]
    pub fn confirm_pending(&mut self, actor: Actor, ticket_id: &TicketId) -> Result<(), GameError> {
        self.apply("confirmPending", |engine| {
            require_host(actor, "confirmPending")?;
            require_status(&engine.state, "confirmPending", &[GameStatus::BookingOpen])?;
            let ticket = engine.eligible_ticket(ticket_id)?;
            let name = match (&ticket.pending_player_name, ticket.is_pending) {
                (Some(name), true) => name.clone(),
                _ => return Err(GuardViolation::NotPending(ticket_id.clone()).into()),
            };

            engine.ticket_mut(ticket_id)?.book(name);
            info!("Pending booking confirmed");
            Ok(())
        })
    }

    /// Drops a pending request; allowed in any status.
    #[instrument(skip(self), fields(status = %self.state.status, ticket_id = %ticket_id))]
    pub fn cancel_pending(&mut self, actor: Actor, ticket_id: &TicketId) -> Result<(), GameError> {
        self.apply("cancelPending", |engine| {
            require_host(actor, "cancelPending")?;
            let ticket = engine
                .state
                .ticket(ticket_id)
                .ok_or_else(|| GuardViolation::TicketNotFound(ticket_id.clone()))?;
            if !ticket.is_pending {
                return Err(GuardViolation::NotPending(ticket_id.clone()).into());
            }

            engine.ticket_mut(ticket_id)?.clear_pending();
            info!("Pending booking cancelled");
            Ok(())
        })
    }

    /// Closes booking and arms the automatic start.
    ///
    /// `seconds` is clamped into the configured countdown window.
    #[instrument(skip(self), fields(status = %self.state.status))]
    pub fn start_countdown(&mut self, actor: Actor, seconds: u64) -> Result<(), GameError> {
        self.apply("startCountdown", |engine| {
            require_host(actor, "startCountdown")?;
            require_status(&engine.state, "startCountdown", &[GameStatus::BookingOpen])?;
            if engine.state.booked_count() == 0 {
                return Err(GuardViolation::NoBookedTickets.into());
            }

            let seconds = engine.config.clamp_countdown(seconds);
            let end_time = i64::try_from(seconds)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| engine.clock.now().checked_add_signed(delta))
                .ok_or(ValidationError::CountdownOutOfRange(seconds))?;

            engine.state.status = GameStatus::Countdown;
            engine.state.draw_index = 0;
            engine.state.countdown_end_time = Some(end_time);
            let delay = Duration::from_secs(seconds);
            engine
                .timers
                .arm(TimerPurpose::CountdownExpiry, delay, engine.driver.as_mut());
            info!(seconds, booked = engine.state.booked_count(), "Countdown started");
            Ok(())
        })
    }

    /// Tears the game down, whatever state it is in.
    #[instrument(skip(self), fields(status = %self.state.status))]
    pub fn reset_game(&mut self, actor: Actor) -> Result<(), GameError> {
        self.apply("resetGame", |engine| {
            require_host(actor, "resetGame")?;
            engine.timers.cancel_all(engine.driver.as_mut());
            engine.state = GameState::new(*engine.config.max_prize_ranks());
            info!("Game reset");
            Ok(())
        })
    }

    /// Publishes the full state.
    pub fn publish_snapshot(&self) {
        self.broadcaster
            .publish(GameEvent::Snapshot(Box::new(self.state.clone())));
    }

    /// Runs one operation; success is checked and broadcast, failure is
    /// logged and returned untouched.
    fn apply<F>(&mut self, operation: &'static str, op: F) -> Result<(), GameError>
    where
        F: FnOnce(&mut Self) -> Result<(), GameError>,
    {
        match op(self) {
            Ok(()) => {
                assert_invariants(&self.state);
                self.publish_snapshot();
                Ok(())
            }
            Err(err) => {
                warn!(operation, code = err.code(), error = %err, "Operation rejected");
                Err(err)
            }
        }
    }

    /// A ticket that exists and has not already won.
    fn eligible_ticket(&self, ticket_id: &TicketId) -> Result<&Ticket, GameError> {
        let ticket = self
            .state
            .ticket(ticket_id)
            .ok_or_else(|| GuardViolation::TicketNotFound(ticket_id.clone()))?;
        if ticket.is_winner {
            return Err(GuardViolation::AlreadyWinner(ticket_id.clone()).into());
        }
        Ok(ticket)
    }

    fn ticket_mut(&mut self, ticket_id: &TicketId) -> Result<&mut Ticket, GameError> {
        self.state
            .ticket_mut(ticket_id)
            .ok_or_else(|| GuardViolation::TicketNotFound(ticket_id.clone()).into())
    }
}

fn require_host(actor: Actor, operation: &'static str) -> Result<(), GuardViolation> {
    if actor.is_privileged() {
        Ok(())
    } else {
        Err(GuardViolation::Unauthorized(operation))
    }
}

fn require_status(
    state: &GameState,
    operation: &'static str,
    allowed: &[GameStatus],
) -> Result<(), GuardViolation> {
    if allowed.contains(&state.status) {
        Ok(())
    } else {
        Err(GuardViolation::WrongStatus {
            operation,
            status: state.status,
        })
    }
}

/// Booked tickets and pending requests both block a new claim.
fn ensure_free(ticket: &Ticket) -> Result<(), GuardViolation> {
    if ticket.is_booked {
        Err(GuardViolation::AlreadyBooked(ticket.id().clone()))
    } else if ticket.is_pending {
        Err(GuardViolation::AlreadyPending(ticket.id().clone()))
    } else {
        Ok(())
    }
}

fn player_name_of(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyPlayerName)
    } else {
        Ok(trimmed.to_string())
    }
}
