use crate::modules::storage::{Result, Storage, StorageError};
use crate::types::tables::{Entry, Game, Player, PlayerState, RankField, DEFAULT_RATING};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::Postgres, Pool};
use stackrating_libs::FieldList;

pub struct PgStorage {
    pool: Pool<Postgres>,
}

impl PgStorage {
    pub fn new(pool: Pool<Postgres>) -> Self {
        PgStorage { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn find_game(&self, id: i32) -> Result<Option<Game>> {
        let game = sqlx::query_as(&format!(
            "SELECT {} FROM games WHERE id = $1;",
            Game::field_list()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(game)
    }

    /// Creates the game or updates all of its columns.
    ///
    /// Uses MERGE INTO (PostgreSQL 15 or later).
    async fn upsert_game(&self, game: &Game) -> Result<()> {
        let result = sqlx::query(
            r#"
            MERGE INTO "games"
            USING
                (VALUES($1, $2, $3, $4)) AS "game"("id", "title", "post_time", "last_visit")
            ON
                "games"."id" = "game"."id"
            WHEN MATCHED THEN
                UPDATE SET ("title", "post_time", "last_visit") = ("game"."title", "game"."post_time", "game"."last_visit")
            WHEN NOT MATCHED THEN
                INSERT ("id", "title", "post_time", "last_visit")
                VALUES ("game"."id", "game"."title", "game"."post_time", "game"."last_visit");
            "#,
        )
        .bind(game.id)
        .bind(&game.title)
        .bind(game.post_time)
        .bind(game.last_visit)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!("an error occurred at saving game {}: {:?}", game.id, e);
            return Err(StorageError::from(e));
        }

        Ok(())
    }

    async fn find_player(&self, id: i32) -> Result<Option<Player>> {
        let player = sqlx::query_as(&format!(
            "SELECT {} FROM players WHERE id = $1;",
            Player::field_list()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(player)
    }

    async fn upsert_player(&self, player: &Player) -> Result<()> {
        let result = sqlx::query(
            r#"
            MERGE INTO "players"
            USING
                (VALUES($1, $2, $3, $4, $5, $6)) AS "player"("id", "display_name", "rep", "rating", "rating_pos", "rep_pos")
            ON
                "players"."id" = "player"."id"
            WHEN MATCHED THEN
                UPDATE SET (
                    "display_name",
                    "rep",
                    "rating",
                    "rating_pos",
                    "rep_pos"
                ) = (
                    "player"."display_name",
                    "player"."rep",
                    "player"."rating",
                    "player"."rating_pos",
                    "player"."rep_pos"
                )
            WHEN NOT MATCHED THEN
                INSERT ("id", "display_name", "rep", "rating", "rating_pos", "rep_pos")
                VALUES (
                    "player"."id",
                    "player"."display_name",
                    "player"."rep",
                    "player"."rating",
                    "player"."rating_pos",
                    "player"."rep_pos"
                );
            "#,
        )
        .bind(player.id)
        .bind(&player.display_name)
        .bind(player.rep)
        .bind(player.rating)
        .bind(player.rating_pos)
        .bind(player.rep_pos)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!("an error occurred at saving player {}: {:?}", player.id, e);
            return Err(StorageError::from(e));
        }

        Ok(())
    }

    async fn find_entry(&self, id: i32, game_id: i32) -> Result<Option<Entry>> {
        let entry = sqlx::query_as(&format!(
            "SELECT {} FROM entries WHERE id = $1 AND game_id = $2;",
            Entry::field_list()
        ))
        .bind(id)
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn upsert_entry(&self, entry: &Entry) -> Result<()> {
        let result = sqlx::query(
            r#"
            MERGE INTO "entries"
            USING
                (VALUES($1, $2, $3, $4, $5, $6)) AS "entry"("id", "player_id", "game_id", "votes", "post_time", "rating_delta")
            ON
                "entries"."id" = "entry"."id"
            WHEN MATCHED THEN
                UPDATE SET (
                    "player_id",
                    "game_id",
                    "votes",
                    "post_time",
                    "rating_delta"
                ) = (
                    "entry"."player_id",
                    "entry"."game_id",
                    "entry"."votes",
                    "entry"."post_time",
                    "entry"."rating_delta"
                )
            WHEN NOT MATCHED THEN
                INSERT ("id", "player_id", "game_id", "votes", "post_time", "rating_delta")
                VALUES (
                    "entry"."id",
                    "entry"."player_id",
                    "entry"."game_id",
                    "entry"."votes",
                    "entry"."post_time",
                    "entry"."rating_delta"
                );
            "#,
        )
        .bind(entry.id)
        .bind(entry.player_id)
        .bind(entry.game_id)
        .bind(entry.votes)
        .bind(entry.post_time)
        .bind(entry.rating_delta)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!("an error occurred at saving entry {}: {:?}", entry.id, e);
            return Err(StorageError::from(e));
        }

        Ok(())
    }

    async fn update_entries(&self, entries: &[Entry]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("failed to start transaction cause: {:?}", e);
            e
        })?;

        for entry in entries.iter() {
            let result = sqlx::query(
                r#"
                UPDATE "entries"
                SET
                    "votes" = $2,
                    "post_time" = $3,
                    "rating_delta" = $4
                WHERE
                    "id" = $1;
                "#,
            )
            .bind(entry.id)
            .bind(entry.votes)
            .bind(entry.post_time)
            .bind(entry.rating_delta)
            .execute(&mut tx)
            .await;

            if let Err(e) = result {
                tracing::error!("an error occurred at updating {:?}: {:?}", entry, e);
                tx.rollback().await?;
                return Err(StorageError::from(e));
            }
        }

        tx.commit().await?;

        Ok(())
    }

    async fn entries_for_game_range(
        &self,
        from_game_id: i32,
        to_game_id: i32,
    ) -> Result<Vec<Entry>> {
        let entries = sqlx::query_as(&format!(
            r#"
            SELECT
                {},
                games.post_time AS game_post_time
            FROM
                entries
                JOIN games ON games.id = entries.game_id
            WHERE
                entries.game_id BETWEEN $1 AND $2
            ORDER BY
                entries.game_id,
                entries.id;
            "#,
            Entry::qualified_field_list("entries")
        ))
        .bind(from_game_id)
        .bind(to_game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn player_states_before(
        &self,
        before_game_id: i32,
        player_ids: &[i32],
    ) -> Result<Vec<PlayerState>> {
        let states = sqlx::query_as(
            r#"
            SELECT
                players.id AS player_id,
                COUNT(entries.id)::INT4 AS num_games_played,
                ($3 + COALESCE(SUM(entries.rating_delta), 0))::FLOAT8 AS current_rating
            FROM
                players
                LEFT JOIN entries ON entries.player_id = players.id AND entries.game_id < $1
            WHERE
                players.id = ANY($2)
            GROUP BY
                players.id;
            "#,
        )
        .bind(before_game_id)
        .bind(player_ids)
        .bind(DEFAULT_RATING)
        .fetch_all(&self.pool)
        .await?;

        Ok(states)
    }

    async fn update_ratings(&self, ratings: &[(i32, f64)]) -> Result<()> {
        let (ids, values): (Vec<i32>, Vec<f64>) = ratings.iter().copied().unzip();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE "players"
            SET
                "rating" = "new"."rating"
            FROM
                UNNEST($1::INT4[], $2::FLOAT8[]) AS "new"("id", "rating")
            WHERE
                "players"."id" = "new"."id";
            "#,
        )
        .bind(&ids)
        .bind(&values)
        .execute(&mut tx)
        .await;

        if let Err(e) = result {
            tracing::error!("an error occurred at updating {} ratings: {:?}", ids.len(), e);
            tx.rollback().await?;
            return Err(StorageError::from(e));
        }

        tx.commit().await?;

        Ok(())
    }

    async fn update_rank_positions(
        &self,
        field: RankField,
        from_id: i32,
        to_id: i32,
    ) -> Result<()> {
        sqlx::query(&format!(
            r#"
            UPDATE "players"
            SET
                "{position}" = "ranked"."position"
            FROM
                (
                    SELECT
                        "id",
                        DENSE_RANK() OVER (ORDER BY "{field}" DESC)::INT4 AS "position"
                    FROM
                        "players"
                ) AS "ranked"
            WHERE
                "players"."id" = "ranked"."id"
                AND "players"."id" BETWEEN $1 AND $2;
            "#,
            position = field.position_column(),
            field = field.column(),
        ))
        .bind(from_id)
        .bind(to_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn max_game_id(&self) -> Result<Option<i32>> {
        let id = sqlx::query_scalar("SELECT MAX(id) FROM games;")
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    async fn max_player_id(&self) -> Result<Option<i32>> {
        let id = sqlx::query_scalar("SELECT MAX(id) FROM players;")
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    async fn cycle_start_game_id(&self) -> Result<Option<i32>> {
        let id = sqlx::query_scalar(
            r#"
            SELECT
                COALESCE(
                    (SELECT MIN(id) FROM games WHERE last_visit < post_time + INTERVAL '90 days'),
                    (SELECT MAX(id) FROM games)
                );
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn batch_update_last_visit(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        visit_time: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE "games"
            SET
                "last_visit" = $3
            WHERE
                "post_time" BETWEEN $1 AND $2;
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(visit_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_name_and_rep(&self, id: i32, display_name: &str, rep: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "players"
            SET
                "display_name" = $2,
                "rep" = $3
            WHERE
                "id" = $1;
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(rep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
