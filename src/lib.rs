pub mod api;
pub mod config;
pub mod media;
pub mod models;
pub mod pagination;
pub mod storage;
pub mod user_models;
pub mod user_storage;
