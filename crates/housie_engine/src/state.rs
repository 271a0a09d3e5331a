//! The canonical game record.

use crate::sequence::DrawSequence;
use crate::ticket::{Ticket, TicketId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Lifecycle status of the game.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Nothing created yet, or the last game was reset.
    #[default]
    NoActiveGame,
    /// Tickets exist and players may book them.
    BookingOpen,
    /// Booking closed, waiting for the automatic start.
    Countdown,
    /// Numbers are being called.
    Running,
    /// Finished; see [`GameEndReason`].
    Completed,
}

/// Why a game reached `COMPLETED`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEndReason {
    /// Every number in the draw sequence was called.
    SequenceComplete,
    /// All configured prize ranks were awarded.
    FullHousieComplete,
}

/// One awarded prize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    ticket_id: TicketId,
    player_name: String,
    prize_rank: u32,
    declared_at: DateTime<Utc>,
    called_numbers_snapshot: Vec<u8>,
}

impl WinnerRecord {
    pub(crate) fn new(
        ticket_id: TicketId,
        player_name: String,
        prize_rank: u32,
        declared_at: DateTime<Utc>,
        called_numbers_snapshot: Vec<u8>,
    ) -> Self {
        Self {
            ticket_id,
            player_name,
            prize_rank,
            declared_at,
            called_numbers_snapshot,
        }
    }
}

/// Full game state; this is also the snapshot pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub(crate) status: GameStatus,
    pub(crate) tickets: Vec<Ticket>,
    pub(crate) called_numbers: Vec<u8>,
    pub(crate) draw_sequence: DrawSequence,
    pub(crate) draw_index: usize,
    pub(crate) max_prize_ranks: u32,
    /// Ranks awarded so far; the next award gets `current_prize_rank + 1`.
    pub(crate) current_prize_rank: u32,
    pub(crate) winners: Vec<WinnerRecord>,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) ended_at: Option<DateTime<Utc>>,
    pub(crate) countdown_end_time: Option<DateTime<Utc>>,
    pub(crate) last_call_time: Option<DateTime<Utc>>,
    pub(crate) game_end_reason: Option<GameEndReason>,
}

impl GameState {
    /// Fresh `NO_ACTIVE_GAME` state.
    pub fn new(max_prize_ranks: u32) -> Self {
        Self {
            status: GameStatus::NoActiveGame,
            tickets: Vec::new(),
            called_numbers: Vec::new(),
            draw_sequence: DrawSequence::default(),
            draw_index: 0,
            max_prize_ranks,
            current_prize_rank: 0,
            winners: Vec::new(),
            created_at: None,
            started_at: None,
            ended_at: None,
            countdown_end_time: None,
            last_call_time: None,
            game_end_reason: None,
        }
    }

    /// Looks up a ticket by id.
    pub fn ticket(&self, id: &TicketId) -> Option<&Ticket> {
        self.tickets.iter().find(|ticket| ticket.id() == id)
    }

    /// Prize rank awarded to a ticket, if it has won.
    pub fn prize_rank_of(&self, id: &TicketId) -> Option<u32> {
        self.ticket(id).and_then(|ticket| ticket.prize_rank)
    }

    pub(crate) fn ticket_mut(&mut self, id: &TicketId) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|ticket| ticket.id() == id)
    }

    /// Tickets currently booked.
    pub fn booked_count(&self) -> usize {
        self.tickets.iter().filter(|ticket| ticket.is_booked).count()
    }

    /// True once every configured prize rank has been awarded.
    pub fn ranks_exhausted(&self) -> bool {
        self.current_prize_rank >= self.max_prize_ranks
    }

    /// True once the draw cursor has passed the end of the sequence.
    pub fn sequence_exhausted(&self) -> bool {
        self.draw_index >= self.draw_sequence.len()
    }

    /// Next number the scheduler would call.
    pub fn next_number(&self) -> Option<u8> {
        self.draw_sequence.get(self.draw_index)
    }
}
