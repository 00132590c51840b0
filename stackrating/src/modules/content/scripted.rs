use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stackrating_libs::stackexchange::{ApiError, ApiPage, ContentSource, Question, User};
use std::collections::VecDeque;
use std::sync::Mutex;

type Response<T> = Result<ApiPage<T>, ApiError>;

/// Content source answering with prepared pages, for tests.
///
/// Once the prepared pages run out, every further request gets an empty last page.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    questions: Mutex<VecDeque<Response<Question>>>,
    users: Mutex<VecDeque<Response<User>>>,
    question_requests: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>, u32)>>,
    user_requests: Mutex<Vec<u32>>,
}

pub fn page<T>(items: Vec<T>, has_more: bool, quota_remaining: i32) -> ApiPage<T> {
    ApiPage {
        items,
        has_more,
        quota_max: 10000,
        quota_remaining,
        backoff: None,
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_questions(&self, response: Response<Question>) {
        self.questions.lock().unwrap().push_back(response);
    }

    pub fn push_users(&self, response: Response<User>) {
        self.users.lock().unwrap().push_back(response);
    }

    /// `(from, to, page)` of every question request, in call order.
    pub fn question_requests(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>, u32)> {
        self.question_requests.lock().unwrap().clone()
    }

    pub fn user_requests(&self) -> Vec<u32> {
        self.user_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn fetch_questions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_number: u32,
        _page_size: u32,
    ) -> Result<ApiPage<Question>, ApiError> {
        self.question_requests
            .lock()
            .unwrap()
            .push((from, to, page_number));
        let next = self.questions.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(page(Vec::new(), false, 9000)))
    }

    async fn fetch_users(
        &self,
        page_number: u32,
        _page_size: u32,
    ) -> Result<ApiPage<User>, ApiError> {
        self.user_requests.lock().unwrap().push(page_number);
        let next = self.users.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(page(Vec::new(), false, 9000)))
    }
}
