//! Ticket layout invariant: the 3x9 grid obeys the housie rules.

use super::Invariant;
use crate::state::GameState;
use crate::ticket::{COLUMNS, NUMBERS_PER_ROW, NUMBERS_PER_TICKET, ROWS, Ticket, column_band};

/// Invariant: a ticket has a legal layout.
///
/// Five numbers per row, one to three per column, every value inside its
/// column's band, values ascending down each column. Ascending within
/// disjoint bands also makes all fifteen values distinct.
pub struct TicketLayoutInvariant;

impl Invariant<Ticket> for TicketLayoutInvariant {
    fn holds(ticket: &Ticket) -> bool {
        let grid = ticket.grid();

        let rows_ok = grid
            .iter()
            .all(|row| row.iter().filter(|&&n| n != 0).count() == NUMBERS_PER_ROW);
        if !rows_ok || ticket.numbers().count() != NUMBERS_PER_TICKET {
            return false;
        }

        (0..COLUMNS).all(|column| {
            let band = column_band(column);
            let values: Vec<u8> = (0..ROWS)
                .map(|row| grid[row][column])
                .filter(|&n| n != 0)
                .collect();
            (1..=ROWS).contains(&values.len())
                && values.iter().all(|n| band.contains(n))
                && values.windows(2).all(|pair| pair[0] < pair[1])
        })
    }

    fn description() -> &'static str {
        "Ticket grid has 15 numbers, 5 per row, 1-3 per column, all within column bands"
    }
}

impl Invariant<GameState> for TicketLayoutInvariant {
    fn holds(state: &GameState) -> bool {
        state.tickets().iter().all(<Self as Invariant<Ticket>>::holds)
    }

    fn description() -> &'static str {
        "Every ticket in the game has a legal layout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TicketGenerator;
    use crate::ticket::TicketId;

    #[test]
    fn test_generated_ticket_holds() {
        let ticket = TicketGenerator::seeded(12).generate(1);
        assert!(<TicketLayoutInvariant as Invariant<Ticket>>::holds(&ticket));
    }

    #[test]
    fn test_out_of_band_value_violates() {
        let mut grid = TicketGenerator::seeded(12).generate_grid();
        let row = (0..ROWS).find(|&row| grid[row][0] != 0).expect("column 0 is never empty");
        grid[row][0] = 10;
        let ticket = Ticket::new(TicketId::from_ordinal(1), grid);
        assert!(!<TicketLayoutInvariant as Invariant<Ticket>>::holds(&ticket));
    }

    #[test]
    fn test_short_row_violates() {
        let mut grid = TicketGenerator::seeded(12).generate_grid();
        let column = (0..COLUMNS).find(|&c| grid[0][c] != 0).expect("row 0 has numbers");
        grid[0][column] = 0;
        let ticket = Ticket::new(TicketId::from_ordinal(1), grid);
        assert!(!<TicketLayoutInvariant as Invariant<Ticket>>::holds(&ticket));
    }
}
