//! Core domain + application logic for the news rewrite relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the generation
//! service live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod rate_limit;
pub mod rewrite;
pub mod security;
pub mod supervisor;
pub mod utils;

pub use errors::{Error, Result};
