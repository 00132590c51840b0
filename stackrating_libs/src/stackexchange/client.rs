use crate::stackexchange::model::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

type Result<T> = std::result::Result<T, ApiError>;

pub const DEFAULT_API_URL: &str = "https://api.stackexchange.com/2.3/";

/// Includes the answers (with owners) of each question.
pub const DEFAULT_QUESTION_FILTER: &str = "!)IMA2K9zb551p*lhR1G2BOBhUlbt_W6F_3Xb";
pub const DEFAULT_USER_FILTER: &str = "!T6o*9ZK8_erLKZ5IC*";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to request to Stack Exchange API")]
    RequestError(#[from] reqwest::Error),
    #[error("failed to deserialize JSON data")]
    DeserializeError(#[from] serde_json::Error),
    #[error("invalid API url given")]
    InvalidUrlError(#[from] url::ParseError),
    #[error("API error {id} ({name}): {message}")]
    ResponseError {
        id: i32,
        name: String,
        message: String,
    },
}

/// Source of questions and users, paged and quota metered.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Questions created in `[from, to)`, oldest first.
    async fn fetch_questions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> Result<ApiPage<Question>>;

    /// Users ordered by reputation, highest first.
    async fn fetch_users(&self, page: u32, page_size: u32) -> Result<ApiPage<User>>;
}

pub struct StackExchangeClient {
    site: String,
    key: Option<String>,
    questions_url: Url,
    users_url: Url,
    client: Client,
}

impl StackExchangeClient {
    pub fn new(site: &str, key: Option<String>) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, site, key)
    }

    pub fn with_api_url(api_url: &str, site: &str, key: Option<String>) -> Result<Self> {
        let api_url = Url::parse(api_url)?;
        let questions_url = api_url.join("questions")?;
        let users_url = api_url.join("users")?;

        let client = Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(StackExchangeClient {
            site: String::from(site),
            key,
            questions_url,
            users_url,
            client,
        })
    }

    fn common_params(&self, page: u32, page_size: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("site", self.site.clone()),
            ("page", page.to_string()),
            ("pagesize", page_size.to_string()),
        ];
        if let Some(key) = &self.key {
            params.push(("key", key.clone()));
        }
        params
    }

    async fn get<T>(&self, url: &Url, params: &[(&'static str, String)]) -> Result<ApiPage<T>>
    where
        T: DeserializeOwned,
    {
        let res = self.client.get(url.clone()).query(params).send().await?;
        match res.error_for_status_ref() {
            Ok(_) => {
                let body = res.bytes().await?;
                let page: ApiPage<T> = serde_json::from_slice(&body)?;
                Ok(page)
            }
            Err(e) => {
                let body = res.bytes().await?;
                match serde_json::from_slice::<ApiErrorInfo>(&body) {
                    Ok(info) => Err(ApiError::ResponseError {
                        id: info.error_id,
                        name: info.error_name,
                        message: info.error_message,
                    }),
                    Err(_) => Err(ApiError::RequestError(e)),
                }
            }
        }
    }
}

#[async_trait]
impl ContentSource for StackExchangeClient {
    async fn fetch_questions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> Result<ApiPage<Question>> {
        let mut params = self.common_params(page, page_size);
        params.extend([
            ("fromdate", from.timestamp().to_string()),
            ("todate", to.timestamp().to_string()),
            ("sort", String::from("creation")),
            ("order", String::from("asc")),
            ("filter", String::from(DEFAULT_QUESTION_FILTER)),
        ]);

        self.get(&self.questions_url, &params).await
    }

    async fn fetch_users(&self, page: u32, page_size: u32) -> Result<ApiPage<User>> {
        let mut params = self.common_params(page, page_size);
        params.extend([
            ("sort", String::from("reputation")),
            ("order", String::from("desc")),
            ("filter", String::from(DEFAULT_USER_FILTER)),
        ]);

        self.get(&self.users_url, &params).await
    }
}
