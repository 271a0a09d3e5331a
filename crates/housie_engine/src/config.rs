//! Engine tuning knobs.

use crate::winner::TiePolicy;
use derive_getters::Getters;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

/// Longest countdown any config may allow: one day.
pub const COUNTDOWN_CEILING_SECS: u64 = 86_400;
/// Most tickets any config may allow in one game.
pub const TICKET_CEILING: usize = 10_000;

/// Configuration for one game engine.
///
/// Every field has a default, so an empty TOML table is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, Setters)]
#[setters(prefix = "with_")]
pub struct EngineConfig {
    /// Target milliseconds between two calls.
    #[serde(default = "default_call_interval_ms")]
    call_interval_ms: u64,

    /// Distinct prize ranks to award before the game ends.
    #[serde(default = "default_max_prize_ranks")]
    max_prize_ranks: u32,

    /// How simultaneous completions are ranked.
    #[serde(default)]
    tie_policy: TiePolicy,

    /// Shortest countdown the host may request.
    #[serde(default = "default_min_countdown_secs")]
    min_countdown_secs: u64,

    /// Longest countdown the host may request.
    #[serde(default = "default_max_countdown_secs")]
    max_countdown_secs: u64,

    /// Upper bound for `createGame`.
    #[serde(default = "default_max_tickets")]
    max_tickets: usize,

    /// Shuffle 1-90 when the game starts with an empty draw sequence.
    #[serde(default)]
    auto_sequence: bool,

    /// Seed for reproducible tickets and shuffles.
    #[serde(default)]
    #[setters(strip_option)]
    ticket_seed: Option<u64>,
}

fn default_call_interval_ms() -> u64 {
    6_000
}

fn default_max_prize_ranks() -> u32 {
    5
}

fn default_min_countdown_secs() -> u64 {
    5
}

fn default_max_countdown_secs() -> u64 {
    300
}

fn default_max_tickets() -> usize {
    600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_interval_ms: default_call_interval_ms(),
            max_prize_ranks: default_max_prize_ranks(),
            tie_policy: TiePolicy::default(),
            min_countdown_secs: default_min_countdown_secs(),
            max_countdown_secs: default_max_countdown_secs(),
            max_tickets: default_max_tickets(),
            auto_sequence: false,
            ticket_seed: None,
        }
    }
}

impl EngineConfig {
    /// Draw cadence.
    pub fn call_interval(&self) -> Duration {
        Duration::from_millis(self.call_interval_ms)
    }

    /// Clamps a requested countdown into the allowed window.
    pub fn clamp_countdown(&self, seconds: u64) -> u64 {
        seconds.clamp(self.min_countdown_secs, self.max_countdown_secs)
    }

    /// Repairs values that would make the engine unusable.
    #[instrument(skip(self))]
    pub fn normalized(mut self) -> Self {
        if self.max_prize_ranks == 0 {
            warn!("max_prize_ranks of 0 raised to 1");
            self.max_prize_ranks = 1;
        }
        if self.max_countdown_secs > COUNTDOWN_CEILING_SECS {
            warn!(
                max = self.max_countdown_secs,
                ceiling = COUNTDOWN_CEILING_SECS,
                "max_countdown_secs lowered to ceiling"
            );
            self.max_countdown_secs = COUNTDOWN_CEILING_SECS;
        }
        self.min_countdown_secs = self.min_countdown_secs.min(COUNTDOWN_CEILING_SECS);
        if self.min_countdown_secs > self.max_countdown_secs {
            warn!(
                min = self.min_countdown_secs,
                max = self.max_countdown_secs,
                "Countdown bounds inverted, swapping"
            );
            std::mem::swap(&mut self.min_countdown_secs, &mut self.max_countdown_secs);
        }
        if self.max_tickets == 0 {
            warn!("max_tickets of 0 raised to 1");
            self.max_tickets = 1;
        }
        if self.max_tickets > TICKET_CEILING {
            warn!(
                max = self.max_tickets,
                ceiling = TICKET_CEILING,
                "max_tickets lowered to ceiling"
            );
            self.max_tickets = TICKET_CEILING;
        }
        self
    }
}
