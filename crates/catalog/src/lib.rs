//! Catalog domain module.
//!
//! This crate contains the records the publishing pipeline works on (products,
//! collections, shops and their product listings) together with the pure
//! variant expansion logic. No IO, no HTTP, no storage.

pub mod collection;
pub mod listing;
pub mod product;
pub mod shop;
pub mod variants;

pub use collection::Collection;
pub use listing::{
    ListingStatus, ListingTransition, ProductOnShop, PublishReceipt, TransitionReason,
};
pub use product::{Image, Price, Product, VariantAttribute};
pub use shop::{Credentials, ProviderKind, Shop, ShopStatus};
pub use variants::{AttributeDomains, VariantMatrix, expand};
