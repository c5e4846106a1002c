pub mod aggregate;

pub use aggregate::{ReturnPriority, ReturnRecord, ReturnStatus, ReturnTexts};
