use crate::types::tables::{PlayerState, DEFAULT_RATING};
use std::collections::HashMap;

/// Running state of every player touched by one recalculation.
///
/// Players are seeded with their state from before the recalculation start, and then
/// accumulate the deltas of the games judged so far.
#[derive(Debug, Default)]
pub struct PlayerStateTracker {
    states: HashMap<i32, PlayerState>,
}

impl PlayerStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rating(&self, player_id: i32) -> f64 {
        self.states
            .get(&player_id)
            .map(|state| state.current_rating)
            .unwrap_or(DEFAULT_RATING)
    }

    pub fn games_played(&self, player_id: i32) -> i32 {
        self.states
            .get(&player_id)
            .map(|state| state.num_games_played)
            .unwrap_or(0)
    }

    pub fn is_tracked(&self, player_id: i32) -> bool {
        self.states.contains_key(&player_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Counts one more game for the player and applies its rating delta.
    pub fn record_game_played(&mut self, player_id: i32, rating_delta: f64) {
        let state = self
            .states
            .entry(player_id)
            .or_insert_with(|| PlayerState::initial(player_id));
        state.num_games_played += 1;
        state.current_rating += rating_delta;
    }

    /// Installs a state loaded from storage.
    ///
    /// Only players that are not tracked yet are seeded. Returns false if the player was
    /// already tracked, in which case the tracked state is kept.
    pub fn seed(&mut self, state: PlayerState) -> bool {
        if self.is_tracked(state.player_id) {
            tracing::warn!(
                "ignoring state of player {} loaded after it was first touched",
                state.player_id
            );
            return false;
        }

        self.states.insert(state.player_id, state);
        true
    }

    /// Final ratings of all tracked players, ordered by player id.
    pub fn ratings(&self) -> Vec<(i32, f64)> {
        let mut ratings: Vec<(i32, f64)> = self
            .states
            .values()
            .map(|state| (state.player_id, state.current_rating))
            .collect();
        ratings.sort_by_key(|(id, _)| *id);
        ratings
    }

    /// Drops all tracked state.
    pub fn release(&mut self) {
        self.states = HashMap::new();
    }
}
