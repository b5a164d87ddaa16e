//! Top-level facade crate for kanjiquiz.
//!
//! Re-exports the protocol core and the client runtime so users can depend on
//! a single crate.

pub mod core {
    pub use kanjiquiz_core::*;
}

pub mod client {
    pub use kanjiquiz_client::*;
}
