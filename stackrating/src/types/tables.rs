use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use stackrating_libs::FieldList;

/// Rating of a player who has not played any game yet.
pub const DEFAULT_RATING: f64 = 1500.0;

/// Answers posted later than this after their question are not judged.
pub const ARCHIVAL_WINDOW_DAYS: i64 = 90;

pub fn archival_window() -> Duration {
    Duration::days(ARCHIVAL_WINDOW_DAYS)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// A question. Answers to the same question compete against each other.
#[derive(Debug, Clone, PartialEq, FromRow, FieldList)]
pub struct Game {
    pub id: i32,
    pub title: String,
    pub post_time: DateTime<Utc>,
    pub last_visit: DateTime<Utc>,
}

impl Game {
    pub const MAX_TITLE_LENGTH: usize = 100;

    pub fn new(id: i32, title: &str, post_time: DateTime<Utc>, last_visit: DateTime<Utc>) -> Self {
        Self {
            id,
            title: truncate_chars(title, Self::MAX_TITLE_LENGTH),
            post_time,
            last_visit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, FieldList)]
pub struct Player {
    pub id: i32,
    pub display_name: String,
    pub rep: i32,
    pub rating: f64,
    pub rating_pos: i32,
    pub rep_pos: i32,
}

impl Player {
    pub const MAX_DISPLAY_NAME_LENGTH: usize = 40;

    pub fn truncated_display_name(display_name: &str) -> String {
        truncate_chars(display_name, Self::MAX_DISPLAY_NAME_LENGTH)
    }

    /// A player seen for the first time.
    pub fn new(id: i32, display_name: &str, rep: i32) -> Self {
        Self {
            id,
            display_name: Self::truncated_display_name(display_name),
            rep,
            rating: DEFAULT_RATING,
            rating_pos: 0,
            rep_pos: 0,
        }
    }

    /// Takes over name and reputation, keeping the derived rating and positions.
    pub fn refreshed(self, display_name: &str, rep: i32) -> Self {
        Self {
            display_name: Self::truncated_display_name(display_name),
            rep,
            ..self
        }
    }
}

/// An answer of a player to a game.
#[derive(Debug, Clone, PartialEq, FromRow, FieldList)]
pub struct Entry {
    pub id: i32,
    pub player_id: i32,
    pub game_id: i32,
    pub votes: i32,
    pub post_time: DateTime<Utc>,
    pub rating_delta: f64,
    /// Post time of the game. Only filled in when entries are loaded for judging.
    #[sqlx(default)]
    #[field_list(skip)]
    pub game_post_time: Option<DateTime<Utc>>,
}

impl Entry {
    /// Whether the entry was posted within the archival window of its game.
    ///
    /// Entries whose game post time is unknown count as within the window.
    pub fn is_within_archival_window(&self) -> bool {
        match self.game_post_time {
            Some(game_post_time) => self.post_time - game_post_time <= archival_window(),
            None => true,
        }
    }
}

/// State of a player as of some game, derived from the entries before it.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct PlayerState {
    pub player_id: i32,
    pub num_games_played: i32,
    pub current_rating: f64,
}

impl PlayerState {
    pub fn initial(player_id: i32) -> Self {
        Self {
            player_id,
            num_games_played: 0,
            current_rating: DEFAULT_RATING,
        }
    }
}

/// Player attributes that have a global position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankField {
    Rating,
    Rep,
}

impl RankField {
    pub fn column(&self) -> &'static str {
        match self {
            RankField::Rating => "rating",
            RankField::Rep => "rep",
        }
    }

    pub fn position_column(&self) -> &'static str {
        match self {
            RankField::Rating => "rating_pos",
            RankField::Rep => "rep_pos",
        }
    }
}
