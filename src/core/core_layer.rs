// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "compat/mod.rs"]
pub mod compat;

#[path = "nicknames/mod.rs"]
pub mod nicknames;

#[path = "coordination/coordination.rs"]
pub mod coordination;
