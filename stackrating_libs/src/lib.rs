pub mod elo;
pub mod fields;
pub mod limiter;
pub mod progress;
pub mod shutdown;
pub mod stackexchange;

pub use fields::FieldList;
pub use stackrating_derive::FieldList;
