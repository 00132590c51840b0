use crate::modules::rating::tracker::PlayerStateTracker;
use crate::modules::storage::{Result, Storage};
use crate::types::tables::{Entry, RankField};
use itertools::Itertools;
use stackrating_libs::elo::{self, PlayerResult};
use stackrating_libs::progress::Progress;
use stackrating_libs::shutdown::Shutdown;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct RatingConfig {
    /// Number of game ids judged and committed together.
    pub window_size: i32,
    /// Number of players whose earlier state is loaded per query.
    pub state_page_size: usize,
    /// Number of player ratings written per query.
    pub rating_page_size: usize,
    /// Number of player ids whose rank position is written per query.
    pub rank_batch_size: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            state_page_size: 100,
            rating_page_size: 1000,
            rank_batch_size: 50000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Completed,
    /// Shutdown was requested between two windows.
    ///
    /// Entry deltas of the committed windows are kept, but no player rating or rating position
    /// was written. Stored ratings stay stale until a later run covers those games again, so
    /// the next run should start no later than this one did.
    Interrupted,
}

/// Judges a single game.
///
/// All deltas are reset first. Entries outside of the archival window are only judged when
/// the game has a single entry anyway, which yields a zero delta. Every entry counts as a
/// played game for its player, whether it was judged or not.
pub fn judge_game(tracker: &mut PlayerStateTracker, entries: &mut [Entry]) {
    for entry in entries.iter_mut() {
        entry.rating_delta = 0.0;
    }

    let judged: Vec<usize> = if entries.len() > 1 {
        (0..entries.len())
            .filter(|&i| entries[i].is_within_archival_window())
            .collect()
    } else {
        Vec::new()
    };

    if judged.len() >= 2 {
        let results: Vec<PlayerResult> = judged
            .iter()
            .map(|&i| {
                let entry = &entries[i];
                PlayerResult::new(
                    tracker.games_played(entry.player_id),
                    tracker.rating(entry.player_id),
                    f64::from(entry.votes),
                )
            })
            .collect();

        let deltas = elo::compute_rating_deltas(&results);
        for (&i, delta) in judged.iter().zip(deltas) {
            entries[i].rating_delta = delta;
        }
    }

    for entry in entries.iter() {
        tracker.record_game_played(entry.player_id, entry.rating_delta);
    }
}

/// Recomputes entry deltas and player ratings from some game on.
///
/// Games are judged in ascending id order, window by window. Every window is committed on its
/// own, so a failed run leaves the windows before it judged, and running again from the same
/// game produces the same result.
pub struct RatingUpdater<'a, S: Storage + ?Sized> {
    storage: &'a S,
    shutdown: &'a Shutdown,
    config: RatingConfig,
}

impl<'a, S: Storage + ?Sized> RatingUpdater<'a, S> {
    pub fn new(storage: &'a S, shutdown: &'a Shutdown) -> Self {
        Self::with_config(storage, shutdown, RatingConfig::default())
    }

    pub fn with_config(storage: &'a S, shutdown: &'a Shutdown, config: RatingConfig) -> Self {
        Self {
            storage,
            shutdown,
            config,
        }
    }

    pub async fn recompute(&self, from_game_id: i32) -> Result<RecomputeOutcome> {
        let max_game_id = match self.storage.max_game_id().await? {
            Some(id) => id,
            None => {
                tracing::info!("there are no games to rejudge");
                return Ok(RecomputeOutcome::Completed);
            }
        };

        let from_game_id = from_game_id.max(0);
        if from_game_id > max_game_id {
            tracing::info!(
                "no games to rejudge from {}, latest game is {}",
                from_game_id,
                max_game_id
            );
            return Ok(RecomputeOutcome::Completed);
        }

        tracing::info!("start to rejudge games {} to {}", from_game_id, max_game_id);

        let window_size = self.config.window_size.max(1);
        let mut tracker = PlayerStateTracker::new();
        let mut progress = Progress::new(
            "rejudging games",
            (i64::from(max_game_id) - i64::from(from_game_id) + 1) as u64,
        );

        let mut window_start = from_game_id;
        loop {
            if self.shutdown.is_requested() {
                tracing::info!(
                    "shutdown requested, stop rejudging before game {}",
                    window_start
                );
                return Ok(RecomputeOutcome::Interrupted);
            }

            let window_end = window_start.saturating_add(window_size - 1).min(max_game_id);
            self.judge_window(&mut tracker, from_game_id, window_start, window_end)
                .await?;

            progress.set(
                (i64::from(window_end) - i64::from(from_game_id) + 1) as u64,
                &format!("{} players", tracker.len()),
            );

            match window_end.checked_add(1) {
                Some(next) if next <= max_game_id => window_start = next,
                _ => break,
            }
        }

        self.write_ratings(&tracker).await?;
        tracker.release();

        update_positions(self.storage, RankField::Rating, self.config.rank_batch_size).await?;

        tracing::info!("games {} to {} rejudged", from_game_id, max_game_id);
        Ok(RecomputeOutcome::Completed)
    }

    async fn judge_window(
        &self,
        tracker: &mut PlayerStateTracker,
        from_game_id: i32,
        window_start: i32,
        window_end: i32,
    ) -> Result<()> {
        let entries = self
            .storage
            .entries_for_game_range(window_start, window_end)
            .await?;
        if entries.is_empty() {
            return Ok(());
        }

        // Players first seen in this window continue from where they stood before the run.
        let untracked: Vec<i32> = entries
            .iter()
            .map(|entry| entry.player_id)
            .filter(|id| !tracker.is_tracked(*id))
            .unique()
            .sorted()
            .collect();
        for ids in untracked.chunks(self.config.state_page_size.max(1)) {
            let states = self
                .storage
                .player_states_before(from_game_id, ids)
                .await?;
            for state in states {
                tracker.seed(state);
            }
        }

        let mut games: BTreeMap<i32, Vec<Entry>> = BTreeMap::new();
        for entry in entries {
            games.entry(entry.game_id).or_default().push(entry);
        }
        for entries in games.values_mut() {
            judge_game(tracker, entries);
        }

        let judged: Vec<Entry> = games.into_values().flatten().collect();
        if let Err(e) = self.storage.update_entries(&judged).await {
            tracing::error!(
                "failed to save judged entries of games {} to {}: {:?}",
                window_start,
                window_end,
                e
            );
            return Err(e);
        }

        tracing::debug!(
            "{} entries of games {} to {} judged",
            judged.len(),
            window_start,
            window_end
        );
        Ok(())
    }

    async fn write_ratings(&self, tracker: &PlayerStateTracker) -> Result<()> {
        if tracker.is_empty() {
            return Ok(());
        }

        let ratings = tracker.ratings();
        tracing::info!("save ratings of {} players", ratings.len());

        for page in ratings.chunks(self.config.rating_page_size.max(1)) {
            self.storage.update_ratings(page).await?;
        }
        Ok(())
    }
}

/// Rewrites the rank position by `field` of every player, in batches of player ids.
pub async fn update_positions<S: Storage + ?Sized>(
    storage: &S,
    field: RankField,
    batch_size: i32,
) -> Result<()> {
    let max_player_id = match storage.max_player_id().await? {
        Some(id) => id,
        None => return Ok(()),
    };

    tracing::info!("start to update {} positions", field.column());

    let batch_size = batch_size.max(1);
    let mut from = 0;
    while from <= max_player_id {
        let to = from.saturating_add(batch_size - 1);
        storage.update_rank_positions(field, from, to).await?;

        from = match to.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }

    tracing::info!("{} positions updated", field.column());
    Ok(())
}
