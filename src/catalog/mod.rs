pub mod client;
pub mod models;

pub use client::CatalogClient;
pub use models::{AttributePair, CatalogProduct, CatalogVariant, ExtraImage};
