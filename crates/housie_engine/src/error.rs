//! Rejection reasons for engine operations.
//!
//! A rejected operation never mutates the game. Rejections go back to the
//! caller only and are never broadcast.

use crate::state::GameStatus;
use crate::ticket::TicketId;
use std::convert::Infallible;

/// Operation attempted outside its legal state or against an ineligible ticket.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum GuardViolation {
    /// The operation needs a privileged (host) actor.
    #[display("{} requires the host", _0)]
    Unauthorized(&'static str),

    /// The game is in a status that does not allow the operation.
    #[display("{} is not allowed while the game is {}", operation, status)]
    WrongStatus {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Status at the time of the attempt.
        status: GameStatus,
    },

    /// No ticket with this id exists in the current game.
    #[display("Ticket {} does not exist", _0)]
    TicketNotFound(TicketId),

    /// The ticket is already booked.
    #[display("Ticket {} is already booked", _0)]
    AlreadyBooked(TicketId),

    /// The ticket is not booked.
    #[display("Ticket {} is not booked", _0)]
    NotBooked(TicketId),

    /// The ticket has already won and can no longer change hands.
    #[display("Ticket {} has already won", _0)]
    AlreadyWinner(TicketId),

    /// The ticket already has a pending booking request.
    #[display("Ticket {} already has a pending request", _0)]
    AlreadyPending(TicketId),

    /// The ticket has no pending booking request.
    #[display("Ticket {} has no pending request", _0)]
    NotPending(TicketId),

    /// The countdown cannot start before anyone has booked.
    #[display("At least one ticket must be booked")]
    NoBookedTickets,
}

impl std::error::Error for GuardViolation {}

/// Malformed input, rejected before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ValidationError {
    /// Ticket count outside `1..=max`.
    #[display("Ticket count {} must be between 1 and {}", requested, max)]
    TicketCountOutOfRange {
        /// Requested count.
        requested: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Draw value outside `1..=90`.
    #[display("Number {} is outside 1-90", _0)]
    NumberOutOfRange(i64),

    /// Draw value appearing more than once.
    #[display("Number {} appears more than once", _0)]
    DuplicateNumber(u8),

    /// Token that is not a number.
    #[display("'{}' is not a number", _0)]
    UnparseableNumber(String),

    /// Blank player name.
    #[display("Player name must not be empty")]
    EmptyPlayerName,

    /// Countdown whose end cannot be represented as a timestamp.
    #[display("Countdown of {} seconds is too long", _0)]
    CountdownOutOfRange(u64),
}

impl std::error::Error for ValidationError {}

/// Any reason an engine operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::From)]
pub enum GameError {
    /// Illegal in the current state.
    #[display("{}", _0)]
    Guard(GuardViolation),
    /// Malformed input.
    #[display("{}", _0)]
    Validation(ValidationError),
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GameError::Guard(err) => Some(err),
            GameError::Validation(err) => Some(err),
        }
    }
}

impl From<Infallible> for GameError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl GameError {
    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Guard(GuardViolation::Unauthorized(_)) => "UNAUTHORIZED",
            GameError::Guard(GuardViolation::WrongStatus { .. }) => "WRONG_STATUS",
            GameError::Guard(GuardViolation::TicketNotFound(_)) => "TICKET_NOT_FOUND",
            GameError::Guard(GuardViolation::AlreadyBooked(_)) => "ALREADY_BOOKED",
            GameError::Guard(GuardViolation::NotBooked(_)) => "NOT_BOOKED",
            GameError::Guard(GuardViolation::AlreadyWinner(_)) => "ALREADY_WINNER",
            GameError::Guard(GuardViolation::AlreadyPending(_)) => "ALREADY_PENDING",
            GameError::Guard(GuardViolation::NotPending(_)) => "NOT_PENDING",
            GameError::Guard(GuardViolation::NoBookedTickets) => "NO_BOOKED_TICKETS",
            GameError::Validation(_) => "INVALID_INPUT",
        }
    }
}
