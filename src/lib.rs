// src/lib.rs

pub mod config;
pub mod core;
pub mod error;
pub mod fuzzy;
pub mod logging;
pub mod model_file;
pub mod persistence;
pub mod protocol;
pub mod session;

pub use crate::config::SuggestConfig;
pub use crate::core::engine::{EngineStats, SuggestionEngine};
pub use crate::core::types::{Source, Suggestion};
pub use crate::error::{ModelError, PersistenceError};
