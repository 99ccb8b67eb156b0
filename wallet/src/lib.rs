//! Wallet monitor: HTTP dashboard API over the sync engine

pub mod api;
pub mod config;
pub mod error;
