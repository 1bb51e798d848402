pub mod config;
pub mod event;
pub mod score;
pub mod time;
