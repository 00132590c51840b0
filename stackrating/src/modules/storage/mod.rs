pub mod postgres;

#[cfg(test)]
pub mod memory;

use crate::types::tables::{Entry, Game, Player, PlayerState, RankField};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use postgres::PgStorage;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database operation failed")]
    DatabaseError(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFoundError(String),
    #[error("{0}")]
    UnexpectedError(String),
}

/// Persistent store of games, players and entries.
///
/// Every call is its own unit of work unless stated otherwise. Batch operations commit all of
/// their rows or none.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn find_game(&self, id: i32) -> Result<Option<Game>>;

    async fn upsert_game(&self, game: &Game) -> Result<()>;

    async fn find_player(&self, id: i32) -> Result<Option<Player>>;

    async fn upsert_player(&self, player: &Player) -> Result<()>;

    async fn find_entry(&self, id: i32, game_id: i32) -> Result<Option<Entry>>;

    async fn upsert_entry(&self, entry: &Entry) -> Result<()>;

    /// Updates the given entries in a single transaction.
    async fn update_entries(&self, entries: &[Entry]) -> Result<()>;

    /// Entries of all games with ids in `from_game_id..=to_game_id`, with their game post
    /// time filled in.
    async fn entries_for_game_range(&self, from_game_id: i32, to_game_id: i32)
        -> Result<Vec<Entry>>;

    /// Games played and rating of the given players, counting only entries of games with ids
    /// below `before_game_id`. Unknown players are left out.
    async fn player_states_before(
        &self,
        before_game_id: i32,
        player_ids: &[i32],
    ) -> Result<Vec<PlayerState>>;

    /// Sets the rating of each `(player id, rating)` pair in a single transaction.
    async fn update_ratings(&self, ratings: &[(i32, f64)]) -> Result<()>;

    /// Writes the dense position (1 = highest) of every player with an id in
    /// `from_id..=to_id`, ranked among all players by `field`.
    async fn update_rank_positions(&self, field: RankField, from_id: i32, to_id: i32)
        -> Result<()>;

    async fn max_game_id(&self) -> Result<Option<i32>>;

    async fn max_player_id(&self) -> Result<Option<i32>>;

    /// Oldest game that still needs to be revisited, i.e. whose last visit happened within
    /// its archival window. Falls back to the newest game once everything is archived.
    async fn cycle_start_game_id(&self) -> Result<Option<i32>>;

    /// Sets the last visit of all games posted in `from..=to`. Returns the number of games.
    async fn batch_update_last_visit(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        visit_time: DateTime<Utc>,
    ) -> Result<u64>;

    /// Updates name and reputation of a known player. Returns false for unknown players.
    async fn update_name_and_rep(&self, id: i32, display_name: &str, rep: i32) -> Result<bool>;
}
