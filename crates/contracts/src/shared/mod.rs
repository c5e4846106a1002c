pub mod logger;
pub mod notification;
pub mod return_filters;
