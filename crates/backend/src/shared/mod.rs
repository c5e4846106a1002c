pub mod config;
pub mod data;
pub mod json_path;
pub mod logger;
pub mod notifier;
