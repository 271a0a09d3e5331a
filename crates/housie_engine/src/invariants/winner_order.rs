//! Winner-order invariant: prize records are ranked and backed by tickets.

use super::Invariant;
use crate::state::GameState;

/// Invariant: winners appear in non-decreasing rank order, never above the
/// configured maximum, and each record points at a booked winning ticket.
///
/// The last recorded rank is also the awarded-rank counter.
pub struct WinnerOrderInvariant;

impl Invariant<GameState> for WinnerOrderInvariant {
    fn holds(state: &GameState) -> bool {
        let winners = state.winners();

        let ordered = winners
            .windows(2)
            .all(|pair| pair[0].prize_rank() <= pair[1].prize_rank());
        let bounded = winners
            .iter()
            .all(|w| (1..=*state.max_prize_ranks()).contains(w.prize_rank()));
        let counter_matches =
            winners.last().map_or(0, |w| *w.prize_rank()) == *state.current_prize_rank();

        let backed = winners.iter().all(|w| {
            state.ticket(w.ticket_id()).is_some_and(|ticket| {
                ticket.is_booked && ticket.is_winner && ticket.prize_rank == Some(*w.prize_rank())
            })
        });
        let flagged = state.tickets().iter().filter(|t| t.is_winner).count() == winners.len();

        ordered && bounded && counter_matches && backed && flagged
    }

    fn description() -> &'static str {
        "Winners are in non-decreasing rank order and each is a booked winning ticket"
    }
}
