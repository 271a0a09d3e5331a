//! Ticket grids and the per-ticket booking and winner bookkeeping.
//!
//! A ticket is a 3x9 grid. Zero marks a blank cell; every other cell holds
//! a number from the column's band (`1-9`, `10-19`, ..., `80-90`).

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use tracing::instrument;

/// Rows on a ticket.
pub const ROWS: usize = 3;
/// Columns on a ticket.
pub const COLUMNS: usize = 9;
/// Filled cells on every ticket.
pub const NUMBERS_PER_TICKET: usize = 15;
/// Filled cells in every row.
pub const NUMBERS_PER_ROW: usize = 5;
/// Smallest callable number.
pub const LOWEST_NUMBER: u8 = 1;
/// Largest callable number.
pub const HIGHEST_NUMBER: u8 = 90;

/// Row-major ticket grid, `0` for blank cells.
pub type Grid = [[u8; COLUMNS]; ROWS];

/// Returns the inclusive numeric band for a column.
///
/// Column 0 starts at 1 and the last column runs up to 90.
pub fn column_band(column: usize) -> RangeInclusive<u8> {
    let start = if column == 0 { LOWEST_NUMBER } else { (column * 10) as u8 };
    let end = if column + 1 == COLUMNS {
        HIGHEST_NUMBER
    } else {
        (column * 10 + 9) as u8
    };
    start..=end
}

/// Stable ticket identifier (`T-01`, `T-02`, ...).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Builds the identifier for the `ordinal`-th ticket (1-based).
    pub fn from_ordinal(ordinal: usize) -> Self {
        Self(format!("T-{ordinal:02}"))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A ticket and everything that happened to it during one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    id: TicketId,
    grid: Grid,
    pub(crate) is_booked: bool,
    pub(crate) booked_by: Option<String>,
    pub(crate) is_pending: bool,
    pub(crate) pending_player_name: Option<String>,
    pub(crate) is_winner: bool,
    pub(crate) prize_rank: Option<u32>,
    pub(crate) win_timestamp: Option<DateTime<Utc>>,
    pub(crate) called_numbers_snapshot_at_win: Option<Vec<u8>>,
}

impl Ticket {
    /// Creates a free ticket with the given grid.
    #[instrument(skip(grid), fields(ticket_id = %id))]
    pub fn new(id: TicketId, grid: Grid) -> Self {
        Self {
            id,
            grid,
            is_booked: false,
            booked_by: None,
            is_pending: false,
            pending_player_name: None,
            is_winner: false,
            prize_rank: None,
            win_timestamp: None,
            called_numbers_snapshot_at_win: None,
        }
    }

    /// Iterates the non-blank values in row-major order.
    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.grid.iter().flatten().copied().filter(|&n| n != 0)
    }

    /// True when every number on the ticket has been called.
    pub fn is_covered_by(&self, called: &HashSet<u8>) -> bool {
        self.numbers().all(|n| called.contains(&n))
    }

    /// True when the ticket is neither booked nor held by a pending request.
    pub fn is_free(&self) -> bool {
        !self.is_booked && !self.is_pending
    }

    pub(crate) fn book(&mut self, player_name: String) {
        self.is_booked = true;
        self.booked_by = Some(player_name);
        self.is_pending = false;
        self.pending_player_name = None;
    }

    pub(crate) fn release(&mut self) {
        self.is_booked = false;
        self.booked_by = None;
    }

    pub(crate) fn clear_pending(&mut self) {
        self.is_pending = false;
        self.pending_player_name = None;
    }
}
