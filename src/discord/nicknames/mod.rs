// Discord adapters for nickname enforcement.

pub mod nickname_monitor;
