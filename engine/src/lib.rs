//! Guess engine for Nutcracker.
//!
//! This crate owns everything between configuration on disk and the HTTP
//! clients: mnemonic batch generation, the generate-submit-log loop, the
//! in-memory engine log with its retention sweep, and the display pollers.
//! The UI shell consumes it through [`Engine`] and the event channel it
//! returns; nothing here draws or reads input.

mod config;
mod controller;
mod log;
mod mnemonic;
mod poller;

pub use config::{ConfigError, EngineConfig, NutcrackerConfig};
pub use controller::{Engine, StartError};
pub use log::LogSink;
pub use mnemonic::{GenerationError, generate_batch};
