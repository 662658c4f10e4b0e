pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod plex;
pub mod session;
pub mod storage;
pub mod validate;
pub mod views;
