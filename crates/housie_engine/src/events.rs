//! Events pushed to observers.

use crate::state::{GameEndReason, GameState, WinnerRecord};
use crate::ticket::TicketId;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

/// A ticket was awarded a prize rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct WinnerEvent {
    rank: u32,
    ticket_id: TicketId,
    player_name: String,
    timestamp: DateTime<Utc>,
    called_numbers_snapshot: Vec<u8>,
}

/// The game reached `COMPLETED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct GameEndEvent {
    reason: GameEndReason,
    winners: Vec<WinnerRecord>,
    final_called_count: usize,
    ended_at: DateTime<Utc>,
}

/// Everything the engine publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum GameEvent {
    /// Full state after a successful mutation.
    Snapshot(Box<GameState>),
    /// A new prize was awarded.
    Winner(WinnerEvent),
    /// The game finished.
    GameEnded(GameEndEvent),
}

/// Receives every event the engine publishes.
///
/// Implementations must not call back into the engine.
pub trait Broadcaster: Send + Sync {
    /// Delivers one event.
    fn publish(&self, event: GameEvent);
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn publish(&self, _event: GameEvent) {}
}
