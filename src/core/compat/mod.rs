// Core compatibility lookup module.
// - `product_codes.rs` finds product codes in free-form text.
// - `compat_models.rs` holds the domain types and the ports.
// - `compat_service.rs` runs single lookups and the reply pipeline.
// - `content_override.rs` is a presentation-only rewrite rule.

pub mod compat_models;
pub mod compat_service;
pub mod content_override;
pub mod product_codes;

pub use compat_models::*;
pub use compat_service::*;
pub use content_override::ContentOverride;
pub use product_codes::{extract_codes, select_codes, CodeLimits, ProductCode};
