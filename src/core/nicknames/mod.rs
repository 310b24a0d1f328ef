// Core nickname enforcement module.
// Following the same pattern as the compat module.

pub mod nickname_models;
pub mod nickname_service;

pub use nickname_models::*;
pub use nickname_service::*;
