//! Core domain types and logic.

pub mod candle;
pub mod indicator;
pub mod strategy;
pub mod signal;
pub mod simulator;
pub mod pipeline;
pub mod universe;
pub mod config_validation;
pub mod error;
