pub mod cache;
pub mod extraction;
pub mod filter_compiler;
pub mod repository;
pub mod service;
pub mod store;
