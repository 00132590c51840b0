use crate::modules::content::downloader::{ContentDownloader, SyncConfig};
use crate::modules::content::{Result, SyncOutcome};
use crate::modules::rating::{update_positions, RatingConfig, RatingUpdater, RecomputeOutcome};
use crate::modules::storage::{Storage, StorageError};
use crate::types::tables::RankField;
use chrono::{DateTime, Utc};
use stackrating_libs::shutdown::Shutdown;
use stackrating_libs::stackexchange::ContentSource;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Below this remaining quota the next cycle waits for `low_quota_sleep`.
    pub low_quota: i32,
    pub low_quota_sleep: Duration,
    /// Wait after a failed cycle.
    pub retry_delay: Duration,
    /// Wait between two successful cycles.
    pub cycle_interval: Duration,
    /// How far back the first synchronization of an empty store reaches.
    pub initial_sync: chrono::Duration,
    pub sync: SyncConfig,
    pub rating: RatingConfig,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            low_quota: 1000,
            low_quota_sleep: Duration::from_secs(24 * 60 * 60),
            retry_delay: Duration::from_secs(60),
            cycle_interval: Duration::from_secs(10 * 60),
            initial_sync: chrono::Duration::days(90),
            sync: SyncConfig::default(),
            rating: RatingConfig::default(),
        }
    }
}

/// Runs the synchronize and rejudge cycle.
pub struct ContentUpdater<'a, S: Storage + ?Sized, C: ContentSource + ?Sized> {
    storage: &'a S,
    shutdown: &'a Shutdown,
    downloader: ContentDownloader<'a, S, C>,
    config: UpdaterConfig,
}

impl<'a, S, C> ContentUpdater<'a, S, C>
where
    S: Storage + ?Sized,
    C: ContentSource + ?Sized,
{
    pub fn new(storage: &'a S, source: &'a C, shutdown: &'a Shutdown) -> Self {
        Self::with_config(storage, source, shutdown, UpdaterConfig::default())
    }

    pub fn with_config(
        storage: &'a S,
        source: &'a C,
        shutdown: &'a Shutdown,
        config: UpdaterConfig,
    ) -> Self {
        Self {
            storage,
            shutdown,
            downloader: ContentDownloader::with_config(
                storage,
                source,
                shutdown,
                config.sync.clone(),
            ),
            config,
        }
    }

    /// Game id to rejudge from and the time to synchronize from.
    ///
    /// An empty store is synchronized from `initial_sync` ago and rejudged from the start.
    pub async fn cycle_start(&self) -> Result<(i32, DateTime<Utc>)> {
        match self.storage.cycle_start_game_id().await? {
            Some(id) => match self.storage.find_game(id).await? {
                Some(game) => Ok((game.id, game.post_time)),
                None => {
                    let message = format!("cycle start game {}", id);
                    Err(StorageError::NotFoundError(message).into())
                }
            },
            None => Ok((0, Utc::now() - self.config.initial_sync)),
        }
    }

    pub async fn do_update_cycle(&mut self) -> Result<SyncOutcome> {
        let (start_game_id, from) = self.cycle_start().await?;
        tracing::info!(
            "Start update cycle from game {} posted at {}",
            start_game_id,
            from
        );

        let mut outcome = self.downloader.refresh_questions(from).await?;
        match outcome {
            SyncOutcome::Interrupted => return Ok(outcome),
            SyncOutcome::QuotaExhausted => {
                tracing::info!("skip refreshing players, quota is exhausted");
            }
            SyncOutcome::Completed => {
                outcome = self.downloader.refresh_players().await?;
                if outcome == SyncOutcome::Interrupted {
                    return Ok(outcome);
                }
            }
        }

        update_positions(self.storage, RankField::Rep, self.config.rating.rank_batch_size).await?;

        let updater =
            RatingUpdater::with_config(self.storage, self.shutdown, self.config.rating.clone());
        if updater.recompute(start_game_id).await? == RecomputeOutcome::Interrupted {
            return Ok(SyncOutcome::Interrupted);
        }

        tracing::info!("Update cycle finished: {:?}", outcome);
        Ok(outcome)
    }

    fn next_delay(&self, outcome: SyncOutcome) -> Duration {
        let low_quota = match self.downloader.quota_remaining() {
            Some(quota) => quota < self.config.low_quota,
            None => false,
        };

        if low_quota || outcome == SyncOutcome::QuotaExhausted {
            tracing::info!(
                "quota is low ({:?} left), wait {:?} before next cycle",
                self.downloader.quota_remaining(),
                self.config.low_quota_sleep
            );
            self.config.low_quota_sleep
        } else {
            self.config.cycle_interval
        }
    }

    /// Repeats update cycles until shutdown is requested. Failed cycles are logged and retried.
    pub async fn run_forever(&mut self) {
        while !self.shutdown.is_requested() {
            let delay = match self.do_update_cycle().await {
                Ok(SyncOutcome::Interrupted) => break,
                Ok(outcome) => self.next_delay(outcome),
                Err(e) => {
                    tracing::error!(
                        "update cycle failed, retry in {:?}: {:?}",
                        self.config.retry_delay,
                        e
                    );
                    self.config.retry_delay
                }
            };

            if !self.shutdown.sleep(delay).await {
                break;
            }
        }

        tracing::info!("Updater stopped");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modules::content::scripted::{page, ScriptedSource};
    use crate::modules::content::UpdateError;
    use crate::modules::storage::memory::MemoryStorage;
    use crate::types::tables::{Game, DEFAULT_RATING};
    use chrono::TimeZone;
    use stackrating_libs::stackexchange::{Answer, ApiError, Question, ShallowUser};
    use std::sync::Arc;

    fn answer(id: i32, user_id: i32, score: i32) -> Answer {
        Answer {
            answer_id: id,
            score,
            is_accepted: false,
            creation_date: Utc::now(),
            owner: Some(ShallowUser {
                user_id: Some(user_id),
                display_name: Some(format!("user{}", user_id)),
                reputation: Some(user_id * 10),
                user_type: Some(String::from("registered")),
            }),
        }
    }

    fn question(id: i32, answers: Vec<Answer>) -> Question {
        Question {
            question_id: id,
            title: format!("question {}", id),
            creation_date: Utc::now(),
            answers,
        }
    }

    fn request_shutdown_after(shutdown: &Arc<Shutdown>, after: Duration) {
        let shutdown = Arc::clone(shutdown);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            shutdown.request();
        });
    }

    #[tokio::test]
    async fn test_first_cycle_on_empty_store() {
        let storage = MemoryStorage::new();
        let source = ScriptedSource::new();
        let shutdown = Shutdown::new();
        source.push_questions(Ok(page(
            vec![question(1, vec![answer(11, 1, 5), answer(12, 2, 1)])],
            false,
            9000,
        )));
        let mut updater = ContentUpdater::new(&storage, &source, &shutdown);

        let outcome = updater.do_update_cycle().await.unwrap();

        assert_eq!(outcome, SyncOutcome::Completed);
        let (from, _, _) = source.question_requests()[0];
        assert!(from < Utc::now() - chrono::Duration::days(89));
        assert_eq!(source.user_requests(), vec![1]);

        assert_eq!(storage.entry(11).unwrap().rating_delta, 4.0);
        assert_eq!(storage.entry(12).unwrap().rating_delta, -4.0);
        let winner = storage.player(1).unwrap();
        assert_eq!(winner.rating, DEFAULT_RATING + 4.0);
        assert_eq!(winner.rating_pos, 1);
        assert_eq!(storage.player(2).unwrap().rating_pos, 2);
        // higher reputation ranks first
        assert_eq!(storage.player(2).unwrap().rep_pos, 1);
    }

    #[tokio::test]
    async fn test_cycle_starts_at_oldest_unarchived_game() {
        let storage = MemoryStorage::new();
        let source = ScriptedSource::new();
        let shutdown = Shutdown::new();
        let old = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();
        storage.put_game(Game::new(1, "archived", old, old + chrono::Duration::days(100)));
        storage.put_game(Game::new(2, "recent", recent, recent));
        let mut updater = ContentUpdater::new(&storage, &source, &shutdown);

        assert_eq!(updater.cycle_start().await.unwrap(), (2, recent));

        updater.do_update_cycle().await.unwrap();
        let (from, _, _) = source.question_requests()[0];
        assert_eq!(from, recent);
    }

    #[tokio::test]
    async fn test_exhausted_quota_skips_player_refresh() {
        let storage = MemoryStorage::new();
        let source = ScriptedSource::new();
        let shutdown = Shutdown::new();
        source.push_questions(Ok(page(
            vec![question(1, vec![answer(11, 1, 5), answer(12, 2, 1)])],
            true,
            10,
        )));
        let mut updater = ContentUpdater::new(&storage, &source, &shutdown);

        let outcome = updater.do_update_cycle().await.unwrap();

        assert_eq!(outcome, SyncOutcome::QuotaExhausted);
        assert!(source.user_requests().is_empty());
        // what was synchronized is still judged
        assert_eq!(storage.entry(11).unwrap().rating_delta, 4.0);
    }

    #[tokio::test]
    async fn test_failed_cycle_is_reported() {
        let storage = MemoryStorage::new();
        let source = ScriptedSource::new();
        let shutdown = Shutdown::new();
        source.push_questions(Err(ApiError::ResponseError {
            id: 500,
            name: String::from("internal_error"),
            message: String::from("something went wrong"),
        }));
        let mut updater = ContentUpdater::new(&storage, &source, &shutdown);

        let result = updater.do_update_cycle().await;

        assert!(matches!(result, Err(UpdateError::SourceError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forever_retries_failed_cycle() {
        let storage = MemoryStorage::new();
        let source = ScriptedSource::new();
        let shutdown = Arc::new(Shutdown::new());
        source.push_questions(Err(ApiError::ResponseError {
            id: 500,
            name: String::from("internal_error"),
            message: String::from("something went wrong"),
        }));
        let config = UpdaterConfig {
            retry_delay: Duration::from_secs(10),
            ..UpdaterConfig::default()
        };
        let mut updater = ContentUpdater::with_config(&storage, &source, &shutdown, config);
        request_shutdown_after(&shutdown, Duration::from_secs(15));

        updater.run_forever().await;

        // the failed request, then the retry which found nothing new
        assert_eq!(source.question_requests().len(), 2);
        assert_eq!(source.user_requests(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forever_waits_long_on_low_quota() {
        let storage = MemoryStorage::new();
        let source = ScriptedSource::new();
        let shutdown = Arc::new(Shutdown::new());
        source.push_questions(Ok(page(vec![question(1, vec![])], false, 500)));
        source.push_questions(Ok(page(Vec::new(), false, 499)));
        source.push_users(Ok(page(Vec::new(), false, 498)));
        let mut updater = ContentUpdater::new(&storage, &source, &shutdown);
        request_shutdown_after(&shutdown, Duration::from_secs(60 * 60));

        updater.run_forever().await;

        // a second cycle would have started after ten minutes
        assert_eq!(source.question_requests().len(), 2);
        assert!(shutdown.is_requested());
    }
}
