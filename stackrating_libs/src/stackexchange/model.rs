use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Common wrapper object of every Stack Exchange API response.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub quota_max: i32,
    #[serde(default)]
    pub quota_remaining: i32,
    /// Seconds to wait before hitting the same method again.
    pub backoff: Option<u64>,
}

impl<T> ApiPage<T> {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff.unwrap_or(0))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiErrorInfo {
    pub error_id: i32,
    pub error_name: String,
    pub error_message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Question {
    pub question_id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub creation_date: DateTime<Utc>,
    #[serde(default = "Vec::new")]
    pub answers: Vec<Answer>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer_id: i32,
    pub score: i32,
    #[serde(default)]
    pub is_accepted: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub creation_date: DateTime<Utc>,
    pub owner: Option<ShallowUser>,
}

impl Answer {
    /// Score used for judging. An accepted answer gets one extra vote.
    pub fn votes(&self) -> i32 {
        self.score + i32::from(self.is_accepted)
    }
}

/// Owner of a post. Deleted or anonymous owners come without a user id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShallowUser {
    pub user_id: Option<i32>,
    pub display_name: Option<String>,
    pub reputation: Option<i32>,
    pub user_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i32,
    pub display_name: String,
    #[serde(default)]
    pub reputation: i32,
}
