//! Supply of quiz content: a prefetch buffer in front of the word provider.

pub mod cache;
pub mod fingerprint;

pub use cache::{SupplyCache, SupplyOptions};
pub use fingerprint::ContentFilter;
