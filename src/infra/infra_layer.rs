// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "compat/mod.rs"]
pub mod compat;

#[path = "nicknames/mod.rs"]
pub mod nicknames;
