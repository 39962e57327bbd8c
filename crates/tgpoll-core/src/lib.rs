//! Core of the Telegram long-polling trigger.
//!
//! Polls `getUpdates`, advances the offset cursor, filters updates by kind and
//! by chat/user allow-lists, and hands batches to a sink. The HTTP transport and
//! the sink live behind ports (traits) implemented elsewhere.

pub mod config;
pub mod domain;
pub mod errors;
pub mod filters;
pub mod logging;
pub mod polling;
pub mod ports;
pub mod trigger;

pub use errors::{Error, Result};
