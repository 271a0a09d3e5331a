//! First-class invariants for tickets and game state.
//!
//! Invariants are logical properties that must hold after every engine
//! operation. They are testable independently, checked in debug builds
//! after each mutation, and double as documentation of what the engine
//! guarantees.

use crate::state::GameState;
use tracing::{error, instrument};

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
///
/// Implementations are provided for tuples.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set.
    ///
    /// Returns Ok(()) if all invariants hold, or Err with every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

impl<S, I1, I2, I3, I4> InvariantSet<S> for (I1, I2, I3, I4)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
    I4: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();

        if !I1::holds(state) {
            violations.push(InvariantViolation::new(I1::description()));
        }

        if !I2::holds(state) {
            violations.push(InvariantViolation::new(I2::description()));
        }

        if !I3::holds(state) {
            violations.push(InvariantViolation::new(I3::description()));
        }

        if !I4::holds(state) {
            violations.push(InvariantViolation::new(I4::description()));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl<S, I1, I2> InvariantSet<S> for (I1, I2)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();

        if !I1::holds(state) {
            violations.push(InvariantViolation::new(I1::description()));
        }

        if !I2::holds(state) {
            violations.push(InvariantViolation::new(I2::description()));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

pub mod booking_consistent;
pub mod called_prefix;
pub mod ticket_layout;
pub mod winner_order;

pub use booking_consistent::BookingConsistentInvariant;
pub use called_prefix::CalledPrefixInvariant;
pub use ticket_layout::TicketLayoutInvariant;
pub use winner_order::WinnerOrderInvariant;

/// Every game-state invariant as a composable set.
pub type GameInvariants = (
    TicketLayoutInvariant,
    CalledPrefixInvariant,
    BookingConsistentInvariant,
    WinnerOrderInvariant,
);

/// Asserts that all game invariants hold (panic on violation in debug builds).
#[instrument(skip(state), fields(status = %state.status()))]
pub fn assert_invariants(state: &GameState) {
    let descriptions = match GameInvariants::check_all(state) {
        Ok(()) => return,
        Err(violations) => violations
            .iter()
            .map(|v| v.description.as_str())
            .collect::<Vec<_>>()
            .join("; "),
    };
    error!(violations = %descriptions, "Game invariants violated");
    debug_assert!(descriptions.is_empty(), "Game invariants violated: {descriptions}");
}
