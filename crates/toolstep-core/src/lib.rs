//! Toolstep core — shared types, configuration, and utilities.

pub mod config;
pub mod types;
pub mod utils;
