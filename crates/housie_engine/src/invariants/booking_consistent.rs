//! Booking flags agree with booking names.

use super::Invariant;
use crate::state::GameState;

/// Invariant: booked and pending flags match their names, and a ticket is
/// never booked and pending at once.
pub struct BookingConsistentInvariant;

impl Invariant<GameState> for BookingConsistentInvariant {
    fn holds(state: &GameState) -> bool {
        state.tickets().iter().all(|ticket| {
            ticket.is_booked == ticket.booked_by.is_some()
                && ticket.is_pending == ticket.pending_player_name.is_some()
                && !(ticket.is_booked && ticket.is_pending)
        })
    }

    fn description() -> &'static str {
        "Booking and pending flags match their player names and never overlap"
    }
}
