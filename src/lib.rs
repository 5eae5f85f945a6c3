pub mod api;
pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod normalize;
pub mod rank;
pub mod round;
pub mod server;
pub mod types;
pub mod use_cases;
