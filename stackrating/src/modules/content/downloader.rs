use crate::modules::content::{Result, SyncOutcome};
use crate::modules::storage::Storage;
use crate::types::tables::{Entry, Game, Player};
use chrono::{DateTime, Utc};
use stackrating_libs::limiter::RateLimiter;
use stackrating_libs::progress::Progress;
use stackrating_libs::shutdown::Shutdown;
use stackrating_libs::stackexchange::{Answer, ApiPage, ContentSource, Question};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Items requested per page.
    pub page_size: u32,
    /// Synchronization stops once the remaining quota drops below this.
    pub min_quota: i32,
    /// Maximum number of user pages refreshed per pass.
    pub user_pages_per_pass: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            min_quota: 50,
            user_pages_per_pass: 50,
        }
    }
}

/// Mirrors questions, answers and their owners from the content source into storage.
///
/// The downloader owns the request limiter, the last seen quota and the resume points of both
/// passes. One instance is meant to live as long as the process.
pub struct ContentDownloader<'a, S: Storage + ?Sized, C: ContentSource + ?Sized> {
    storage: &'a S,
    source: &'a C,
    shutdown: &'a Shutdown,
    limiter: RateLimiter,
    config: SyncConfig,
    quota_remaining: Option<i32>,
    last_processed: Option<Game>,
    user_page: u32,
}

impl<'a, S, C> ContentDownloader<'a, S, C>
where
    S: Storage + ?Sized,
    C: ContentSource + ?Sized,
{
    pub fn new(storage: &'a S, source: &'a C, shutdown: &'a Shutdown) -> Self {
        Self::with_config(storage, source, shutdown, SyncConfig::default())
    }

    pub fn with_config(
        storage: &'a S,
        source: &'a C,
        shutdown: &'a Shutdown,
        config: SyncConfig,
    ) -> Self {
        Self {
            storage,
            source,
            shutdown,
            limiter: RateLimiter::new(),
            config,
            quota_remaining: None,
            last_processed: None,
            user_page: 1,
        }
    }

    /// Remaining request quota reported by the latest response.
    pub fn quota_remaining(&self) -> Option<i32> {
        self.quota_remaining
    }

    pub fn last_processed(&self) -> Option<&Game> {
        self.last_processed.as_ref()
    }

    fn is_quota_exhausted(&self) -> bool {
        matches!(self.quota_remaining, Some(quota) if quota < self.config.min_quota)
    }

    async fn fetch_questions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: u32,
    ) -> Result<ApiPage<Question>> {
        let permit = self.limiter.acquire().await;
        match self
            .source
            .fetch_questions(from, to, page, self.config.page_size)
            .await
        {
            Ok(questions) => {
                permit.release(questions.backoff());
                Ok(questions)
            }
            Err(e) => {
                permit.release(Duration::ZERO);
                tracing::error!("failed to fetch questions from {}: {:?}", from, e);
                Err(e.into())
            }
        }
    }

    /// Synchronizes all questions posted from `from` until now, oldest first.
    pub async fn refresh_questions(&mut self, from: DateTime<Utc>) -> Result<SyncOutcome> {
        let visit_time = Utc::now();
        let mut cursor = from;
        let mut page = 1;
        let mut progress = Progress::new(
            "synchronizing questions",
            (visit_time - from).num_hours().max(0) as u64,
        );

        tracing::info!("Start to synchronize questions posted since {}", from);

        loop {
            if self.shutdown.is_requested() {
                tracing::info!("shutdown requested, stop synchronizing questions");
                return Ok(SyncOutcome::Interrupted);
            }

            let questions = self.fetch_questions(cursor, visit_time, page).await?;
            self.quota_remaining = Some(questions.quota_remaining);

            if questions.is_empty() {
                break;
            }
            if let [only] = questions.items.as_slice() {
                let redelivered = self
                    .last_processed
                    .as_ref()
                    .map_or(false, |game| game.id == only.question_id);
                if redelivered {
                    break;
                }
            }

            for question in questions.items.iter() {
                if self.shutdown.is_requested() {
                    tracing::info!("shutdown requested, stop synchronizing questions");
                    return Ok(SyncOutcome::Interrupted);
                }

                let game = self.save_question(question, visit_time).await?;
                self.last_processed = Some(game);
            }

            let last_post_time = match &self.last_processed {
                Some(game) => game.post_time,
                None => break,
            };

            let visited = self
                .storage
                .batch_update_last_visit(cursor, last_post_time, visit_time)
                .await?;
            tracing::debug!(
                "{} questions synchronized, {} games visited up to {}, quota left {}",
                questions.items.len(),
                visited,
                last_post_time,
                questions.quota_remaining
            );

            // A full page of questions sharing one post time would not move the cursor.
            if last_post_time > cursor {
                cursor = last_post_time;
                page = 1;
            } else {
                page += 1;
            }
            progress.set(
                (cursor - from).num_hours().max(0) as u64,
                &format!("quota: {}, time: {}", questions.quota_remaining, cursor),
            );

            if self.is_quota_exhausted() {
                tracing::warn!(
                    "quota dropped to {}, stop synchronizing questions at {}",
                    questions.quota_remaining,
                    cursor
                );
                return Ok(SyncOutcome::QuotaExhausted);
            }
        }

        tracing::info!("Questions synchronized up to {}", cursor);
        Ok(SyncOutcome::Completed)
    }

    async fn save_question(&self, question: &Question, visit_time: DateTime<Utc>) -> Result<Game> {
        let game = Game::new(
            question.question_id,
            &question.title,
            question.creation_date,
            visit_time,
        );
        self.storage.upsert_game(&game).await?;

        for answer in question.answers.iter() {
            self.save_answer(&game, answer).await?;
        }

        Ok(game)
    }

    async fn save_answer(&self, game: &Game, answer: &Answer) -> Result<()> {
        let owner = answer.owner.as_ref();
        let (player_id, display_name) = match (
            owner.and_then(|owner| owner.user_id),
            owner.and_then(|owner| owner.display_name.as_deref()),
        ) {
            (Some(id), Some(name)) if id > 0 => (id, name),
            _ => {
                tracing::debug!(
                    "skip answer {} to question {} without a valid owner",
                    answer.answer_id,
                    game.id
                );
                return Ok(());
            }
        };
        let rep = owner.and_then(|owner| owner.reputation);

        let player = match self.storage.find_player(player_id).await? {
            Some(player) => {
                let rep = rep.unwrap_or(player.rep);
                player.refreshed(display_name, rep)
            }
            None => Player::new(player_id, display_name, rep.unwrap_or(0)),
        };
        self.storage.upsert_player(&player).await?;

        let rating_delta = self
            .storage
            .find_entry(answer.answer_id, game.id)
            .await?
            .map_or(0.0, |entry| entry.rating_delta);
        let entry = Entry {
            id: answer.answer_id,
            player_id,
            game_id: game.id,
            votes: answer.votes(),
            post_time: answer.creation_date,
            rating_delta,
            game_post_time: None,
        };
        self.storage.upsert_entry(&entry).await?;

        Ok(())
    }

    /// Refreshes display name and reputation of known players, highest reputation first.
    ///
    /// Continues where the previous pass stopped and starts over after the last page.
    pub async fn refresh_players(&mut self) -> Result<SyncOutcome> {
        tracing::info!("Start to refresh players from page {}", self.user_page);
        let initial_quota = self.quota_remaining.unwrap_or(0);
        let mut progress = Progress::new(
            "refreshing players",
            (initial_quota - self.config.min_quota).max(0) as u64,
        );

        for _ in 0..self.config.user_pages_per_pass {
            if self.shutdown.is_requested() {
                tracing::info!("shutdown requested, stop refreshing players");
                return Ok(SyncOutcome::Interrupted);
            }
            if self.is_quota_exhausted() {
                return Ok(SyncOutcome::QuotaExhausted);
            }

            let permit = self.limiter.acquire().await;
            let users = match self
                .source
                .fetch_users(self.user_page, self.config.page_size)
                .await
            {
                Ok(users) => {
                    permit.release(users.backoff());
                    users
                }
                Err(e) => {
                    permit.release(Duration::ZERO);
                    tracing::error!("failed to fetch users page {}: {:?}", self.user_page, e);
                    return Err(e.into());
                }
            };
            self.quota_remaining = Some(users.quota_remaining);
            progress.set(
                (initial_quota - users.quota_remaining).max(0) as u64,
                &format!("page: {}, quota: {}", self.user_page, users.quota_remaining),
            );

            let mut updated = 0;
            for user in users.items.iter() {
                let display_name = Player::truncated_display_name(&user.display_name);
                if self
                    .storage
                    .update_name_and_rep(user.user_id, &display_name, user.reputation)
                    .await?
                {
                    updated += 1;
                }
            }
            tracing::debug!(
                "{} of {} users on page {} refreshed",
                updated,
                users.items.len(),
                self.user_page
            );

            if !users.has_more {
                self.user_page = 1;
                tracing::info!("All players refreshed");
                return Ok(SyncOutcome::Completed);
            }
            self.user_page += 1;
        }

        if self.is_quota_exhausted() {
            return Ok(SyncOutcome::QuotaExhausted);
        }

        tracing::info!("Players refreshed up to page {}", self.user_page - 1);
        Ok(SyncOutcome::Completed)
    }
}
