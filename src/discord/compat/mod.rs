// Discord adapters for compatibility lookups.

pub mod embeds;
pub mod product_code_handler;
