//! Housie engine - type-safe housie/tambola game core
//!
//! This library runs one live number-calling game: it deals tickets, takes
//! bookings, counts down to the start, calls numbers at a steady cadence and
//! ranks full-housie winners.
//!
//! # Architecture
//!
//! - **Tickets**: [`TicketGenerator`] builds valid 3x9 grids
//! - **State machine**: [`GameEngine`] guards and applies every operation
//! - **Scheduling**: [`DrawScheduler`] paces draws and decides when to stop
//! - **Winners**: [`WinnerEvaluator`] awards prize ranks after each call
//! - **Invariants**: checked after every mutation in debug builds
//!
//! The engine performs no I/O. Time, timers and event delivery are injected
//! through [`Clock`], [`TimerDriver`] and [`Broadcaster`].
//!
//! # Example
//!
//! ```
//! use housie_engine::testing::EngineHarness;
//! use housie_engine::{Actor, EngineConfig, GameStatus, TicketId};
//!
//! let mut harness = EngineHarness::new(EngineConfig::default().with_ticket_seed(7));
//! let host = Actor::host();
//!
//! harness.engine.create_game(host, 3)?;
//! harness.engine.book_ticket(Actor::player(), &TicketId::from("T-01"), "Asha")?;
//! harness.engine.set_draw_sequence(host, "1, 2, 3")?;
//! harness.engine.start_countdown(host, 10)?;
//! assert_eq!(*harness.engine.state().status(), GameStatus::Countdown);
//!
//! harness.run_until_idle(10);
//! assert_eq!(*harness.engine.state().status(), GameStatus::Completed);
//! # Ok::<(), housie_engine::GameError>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod clock;
mod config;
mod error;
mod events;
mod generator;
mod machine;
mod scheduler;
mod sequence;
mod state;
mod ticket;
mod winner;

pub mod invariants;
pub mod testing;

// Crate-level exports - Tickets
pub use generator::{MAX_LAYOUT_ATTEMPTS, TicketGenerator};
pub use ticket::{
    COLUMNS, Grid, HIGHEST_NUMBER, LOWEST_NUMBER, NUMBERS_PER_ROW, NUMBERS_PER_TICKET, ROWS,
    Ticket, TicketId, column_band,
};

// Crate-level exports - Game state
pub use sequence::DrawSequence;
pub use state::{GameEndReason, GameState, GameStatus, WinnerRecord};

// Crate-level exports - State machine
pub use machine::{Actor, GameEngine};

// Crate-level exports - Scheduling
pub use clock::{Clock, SystemClock};
pub use scheduler::{
    DrawDecision, DrawScheduler, ScheduledTimer, TimerDriver, TimerPurpose, TimerToken,
};

// Crate-level exports - Winners
pub use winner::{TiePolicy, WinnerEvaluator};

// Crate-level exports - Events
pub use events::{Broadcaster, GameEndEvent, GameEvent, NullBroadcaster, WinnerEvent};

// Crate-level exports - Configuration and errors
pub use config::{COUNTDOWN_CEILING_SECS, EngineConfig, TICKET_CEILING};
pub use error::{GameError, GuardViolation, ValidationError};
