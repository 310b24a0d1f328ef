// Nickname infra layer.

#[path = "sqlite_nickname_store.rs"]
pub mod sqlite_nickname_store;

pub use sqlite_nickname_store::SqliteNicknameStore;
