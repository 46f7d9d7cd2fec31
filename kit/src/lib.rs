#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]
//! Map streaming markup documents onto Rust structs.
//!
//! Declare the mapping with `#[derive(SaxDocument)]`, start a parse with
//! `SaxDocument::parse`, pull the lazy field from the returned
//! [`Parsing`] handle while the document is still being read, then call
//! [`Parsing::finish`] for the populated object.
pub use saxmap_core::*;
pub use saxmap_macros::*;
