//! Called-prefix invariant: called numbers replay the draw sequence.

use super::Invariant;
use crate::state::GameState;

/// Invariant: `called_numbers` is exactly `draw_sequence[..draw_index]`.
///
/// The draw sequence is duplicate-free, so this also rules out repeated
/// calls.
pub struct CalledPrefixInvariant;

impl Invariant<GameState> for CalledPrefixInvariant {
    fn holds(state: &GameState) -> bool {
        let sequence = state.draw_sequence().numbers();
        let index = *state.draw_index();
        index <= sequence.len() && state.called_numbers().as_slice() == &sequence[..index]
    }

    fn description() -> &'static str {
        "Called numbers equal the draw sequence up to the draw index"
    }
}
