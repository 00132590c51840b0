use crate::modules::storage::{Result, Storage, StorageError};
use crate::types::tables::{
    archival_window, Entry, Game, Player, PlayerState, RankField, DEFAULT_RATING,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stackrating_libs::shutdown::Shutdown;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    games: BTreeMap<i32, Game>,
    players: BTreeMap<i32, Player>,
    entries: BTreeMap<i32, Entry>,
    upserted_game_ids: Vec<i32>,
    failing_entry_updates_from: Option<i32>,
    last_visit_updates: usize,
    shutdown_on_upsert_game: Option<(i32, Arc<Shutdown>)>,
    shutdown_on_update_entries: Option<Arc<Shutdown>>,
}

/// In-memory storage for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn put_game(&self, game: Game) {
        self.tables().games.insert(game.id, game);
    }

    pub fn put_player(&self, player: Player) {
        self.tables().players.insert(player.id, player);
    }

    pub fn put_entry(&self, entry: Entry) {
        self.tables().entries.insert(
            entry.id,
            Entry {
                game_post_time: None,
                ..entry
            },
        );
    }

    pub fn game(&self, id: i32) -> Option<Game> {
        self.tables().games.get(&id).cloned()
    }

    pub fn players(&self) -> Vec<Player> {
        self.tables().players.values().cloned().collect()
    }

    pub fn player(&self, id: i32) -> Option<Player> {
        self.tables().players.get(&id).cloned()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.tables().entries.values().cloned().collect()
    }

    pub fn entry(&self, id: i32) -> Option<Entry> {
        self.tables().entries.get(&id).cloned()
    }

    /// Ids passed to `upsert_game`, in call order.
    pub fn upserted_game_ids(&self) -> Vec<i32> {
        self.tables().upserted_game_ids.clone()
    }

    /// Makes `update_entries` fail for batches touching games with ids from `game_id` on.
    pub fn fail_entry_updates_from(&self, game_id: i32) {
        self.tables().failing_entry_updates_from = Some(game_id);
    }

    /// Number of `batch_update_last_visit` calls.
    pub fn last_visit_updates(&self) -> usize {
        self.tables().last_visit_updates
    }

    /// Requests shutdown once the game with `game_id` has been upserted.
    pub fn request_shutdown_on_upsert_game(&self, game_id: i32, shutdown: Arc<Shutdown>) {
        self.tables().shutdown_on_upsert_game = Some((game_id, shutdown));
    }

    /// Requests shutdown once the first batch of entries has been updated.
    pub fn request_shutdown_on_update_entries(&self, shutdown: Arc<Shutdown>) {
        self.tables().shutdown_on_update_entries = Some(shutdown);
    }
}

fn dense_positions(values: &BTreeMap<i32, f64>) -> BTreeMap<i32, i32> {
    let mut distinct: Vec<f64> = values.values().copied().collect();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup();

    values
        .iter()
        .map(|(id, value)| {
            let position = distinct.iter().take_while(|v| *v > value).count() as i32 + 1;
            (*id, position)
        })
        .collect()
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn find_game(&self, id: i32) -> Result<Option<Game>> {
        Ok(self.game(id))
    }

    async fn upsert_game(&self, game: &Game) -> Result<()> {
        let mut tables = self.tables();
        tables.upserted_game_ids.push(game.id);
        tables.games.insert(game.id, game.clone());
        if let Some((game_id, shutdown)) = &tables.shutdown_on_upsert_game {
            if *game_id == game.id {
                shutdown.request();
            }
        }
        Ok(())
    }

    async fn find_player(&self, id: i32) -> Result<Option<Player>> {
        Ok(self.player(id))
    }

    async fn upsert_player(&self, player: &Player) -> Result<()> {
        self.put_player(player.clone());
        Ok(())
    }

    async fn find_entry(&self, id: i32, game_id: i32) -> Result<Option<Entry>> {
        Ok(self.entry(id).filter(|entry| entry.game_id == game_id))
    }

    async fn upsert_entry(&self, entry: &Entry) -> Result<()> {
        self.put_entry(entry.clone());
        Ok(())
    }

    async fn update_entries(&self, entries: &[Entry]) -> Result<()> {
        let mut tables = self.tables();
        if let Some(game_id) = tables.failing_entry_updates_from {
            if entries.iter().any(|entry| entry.game_id >= game_id) {
                return Err(StorageError::UnexpectedError(String::from(
                    "injected entry update failure",
                )));
            }
        }

        for entry in entries {
            if let Some(stored) = tables.entries.get_mut(&entry.id) {
                stored.votes = entry.votes;
                stored.post_time = entry.post_time;
                stored.rating_delta = entry.rating_delta;
            }
        }
        if let Some(shutdown) = tables.shutdown_on_update_entries.take() {
            shutdown.request();
        }
        Ok(())
    }

    async fn entries_for_game_range(
        &self,
        from_game_id: i32,
        to_game_id: i32,
    ) -> Result<Vec<Entry>> {
        let tables = self.tables();
        let mut entries: Vec<Entry> = tables
            .entries
            .values()
            .filter(|entry| from_game_id <= entry.game_id && entry.game_id <= to_game_id)
            .map(|entry| Entry {
                game_post_time: tables.games.get(&entry.game_id).map(|game| game.post_time),
                ..entry.clone()
            })
            .collect();
        entries.sort_by_key(|entry| (entry.game_id, entry.id));
        Ok(entries)
    }

    async fn player_states_before(
        &self,
        before_game_id: i32,
        player_ids: &[i32],
    ) -> Result<Vec<PlayerState>> {
        let tables = self.tables();
        let states = player_ids
            .iter()
            .filter(|id| tables.players.contains_key(*id))
            .map(|&player_id| {
                let played: Vec<&Entry> = tables
                    .entries
                    .values()
                    .filter(|entry| entry.player_id == player_id && entry.game_id < before_game_id)
                    .collect();
                PlayerState {
                    player_id,
                    num_games_played: played.len() as i32,
                    current_rating: DEFAULT_RATING
                        + played.iter().map(|entry| entry.rating_delta).sum::<f64>(),
                }
            })
            .collect();
        Ok(states)
    }

    async fn update_ratings(&self, ratings: &[(i32, f64)]) -> Result<()> {
        let mut tables = self.tables();
        for (id, rating) in ratings {
            if let Some(player) = tables.players.get_mut(id) {
                player.rating = *rating;
            }
        }
        Ok(())
    }

    async fn update_rank_positions(
        &self,
        field: RankField,
        from_id: i32,
        to_id: i32,
    ) -> Result<()> {
        let mut tables = self.tables();
        let values: BTreeMap<i32, f64> = tables
            .players
            .values()
            .map(|player| match field {
                RankField::Rating => (player.id, player.rating),
                RankField::Rep => (player.id, f64::from(player.rep)),
            })
            .collect();

        for (id, position) in dense_positions(&values).range(from_id..=to_id) {
            if let Some(player) = tables.players.get_mut(id) {
                match field {
                    RankField::Rating => player.rating_pos = *position,
                    RankField::Rep => player.rep_pos = *position,
                }
            }
        }
        Ok(())
    }

    async fn max_game_id(&self) -> Result<Option<i32>> {
        Ok(self.tables().games.keys().next_back().copied())
    }

    async fn max_player_id(&self) -> Result<Option<i32>> {
        Ok(self.tables().players.keys().next_back().copied())
    }

    async fn cycle_start_game_id(&self) -> Result<Option<i32>> {
        let tables = self.tables();
        let stale = tables
            .games
            .values()
            .find(|game| game.last_visit < game.post_time + archival_window())
            .map(|game| game.id);
        Ok(stale.or_else(|| tables.games.keys().next_back().copied()))
    }

    async fn batch_update_last_visit(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        visit_time: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tables = self.tables();
        tables.last_visit_updates += 1;
        let mut updated = 0;
        for game in tables.games.values_mut() {
            if from <= game.post_time && game.post_time <= to {
                game.last_visit = visit_time;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn update_name_and_rep(&self, id: i32, display_name: &str, rep: i32) -> Result<bool> {
        let mut tables = self.tables();
        match tables.players.get_mut(&id) {
            Some(player) => {
                player.display_name = String::from(display_name);
                player.rep = rep;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dense_positions() {
        let values = BTreeMap::from([(1, 10.0), (2, 30.0), (3, 10.0), (4, 20.0)]);

        let positions = dense_positions(&values);

        assert_eq!(
            positions,
            BTreeMap::from([(1, 3), (2, 1), (3, 3), (4, 2)])
        );
    }
}
