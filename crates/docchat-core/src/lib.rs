//! Shared domain types, configuration, errors and client events for docchat.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::DocChatConfig;
pub use error::{DocChatError, Result};
pub use events::{ClientEvent, EventBus};
pub use types::*;
