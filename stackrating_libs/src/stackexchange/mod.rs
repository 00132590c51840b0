pub mod client;
pub mod model;

pub use client::{ApiError, ContentSource, StackExchangeClient};
pub use model::{Answer, ApiPage, Question, ShallowUser, User};
