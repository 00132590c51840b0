pub mod content;
pub mod migration;
pub mod rating;
pub mod storage;
