// Compatibility infra layer.
// - `compat_api_client.rs` talks to the compatibility HTTP API.
// - `sqlite_thumbnail_store.rs` reads cached thumbnail URLs.

#[path = "compat_api_client.rs"]
pub mod compat_api_client;

#[path = "sqlite_thumbnail_store.rs"]
pub mod sqlite_thumbnail_store;

pub use compat_api_client::CompatApiClient;
pub use sqlite_thumbnail_store::SqliteThumbnailStore;
