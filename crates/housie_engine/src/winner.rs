//! Full-housie detection and prize-rank assignment.

use crate::events::WinnerEvent;
use crate::state::{GameState, WinnerRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Ranking rule for tickets that complete on the same call.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TiePolicy {
    /// Every ticket completing in one pass shares a rank; the rank counter
    /// advances once per pass.
    #[default]
    SharedRankPerDraw,
    /// Each completing ticket, in ticket order, takes the next rank. Awards
    /// stop once the configured number of ranks is reached.
    SequentialPerTicket,
}

/// Checks booked tickets against the called numbers after each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinnerEvaluator {
    policy: TiePolicy,
}

impl WinnerEvaluator {
    /// Creates an evaluator using `policy` for ties.
    pub fn new(policy: TiePolicy) -> Self {
        Self { policy }
    }

    /// Active tie policy.
    pub fn policy(&self) -> TiePolicy {
        self.policy
    }

    /// Awards ranks to every booked, not-yet-winning ticket whose numbers
    /// have all been called, and returns one event per award.
    ///
    /// Ranks past `max_prize_ranks` are never handed out.
    #[instrument(
        skip(self, state),
        fields(policy = %self.policy, called = state.called_numbers.len())
    )]
    pub fn evaluate(&self, state: &mut GameState, now: DateTime<Utc>) -> Vec<WinnerEvent> {
        if state.ranks_exhausted() {
            return Vec::new();
        }

        let called: HashSet<u8> = state.called_numbers.iter().copied().collect();
        let completing: Vec<usize> = state
            .tickets
            .iter()
            .enumerate()
            .filter(|(_, ticket)| {
                ticket.is_booked && !ticket.is_winner && ticket.is_covered_by(&called)
            })
            .map(|(index, _)| index)
            .collect();

        if completing.is_empty() {
            return Vec::new();
        }
        debug!(count = completing.len(), "Tickets completed on this call");

        let snapshot = state.called_numbers.clone();
        let mut events = Vec::with_capacity(completing.len());
        match self.policy {
            TiePolicy::SharedRankPerDraw => {
                let rank = state.current_prize_rank + 1;
                for index in completing {
                    events.push(award(state, index, rank, now, &snapshot));
                }
                state.current_prize_rank = rank;
            }
            TiePolicy::SequentialPerTicket => {
                for index in completing {
                    if state.ranks_exhausted() {
                        break;
                    }
                    let rank = state.current_prize_rank + 1;
                    events.push(award(state, index, rank, now, &snapshot));
                    state.current_prize_rank = rank;
                }
            }
        }
        events
    }
}

fn award(
    state: &mut GameState,
    index: usize,
    rank: u32,
    now: DateTime<Utc>,
    snapshot: &[u8],
) -> WinnerEvent {
    let ticket = &mut state.tickets[index];
    ticket.is_winner = true;
    ticket.prize_rank = Some(rank);
    ticket.win_timestamp = Some(now);
    ticket.called_numbers_snapshot_at_win = Some(snapshot.to_vec());

    let ticket_id = ticket.id().clone();
    let player_name = ticket.booked_by.clone().unwrap_or_default();
    info!(ticket_id = %ticket_id, player = %player_name, rank, "Full housie");

    state.winners.push(WinnerRecord::new(
        ticket_id.clone(),
        player_name.clone(),
        rank,
        now,
        snapshot.to_vec(),
    ));
    WinnerEvent::new(rank, ticket_id, player_name, now, snapshot.to_vec())
}
