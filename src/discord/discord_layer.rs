// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "compat/mod.rs"]
pub mod compat;

#[path = "nicknames/mod.rs"]
pub mod nicknames;

// Re-export command types for convenience
pub use commands::compat::{Data, Error};
