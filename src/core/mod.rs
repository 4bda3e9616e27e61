pub mod catalog;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod types;
