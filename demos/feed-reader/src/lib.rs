#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Atom Feed Reader Example
//!
//! This example maps Atom feeds onto plain structs with saxmap. Entries are
//! declared lazy, so a reader can process the first entry of a large feed
//! while the rest of the document is still being parsed.
//! It covers:
//! - Attribute, element and text-value fields
//! - Filtered links (`rel="alternate"`)
//! - Nested people and content blocks
//! - A user-defined scalar type via `FromMarkup`
//! - A custom setter accepting two date spellings

use thiserror::Error;

mod model;
mod reader;
mod timestamp;

pub use model::{Content, Entry, Feed, Person};
pub use reader::{FeedSummary, summarize, take_entries};
pub use timestamp::Timestamp;

#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error(transparent)]
    Parse(#[from] saxmap::Error),

    #[error("feed has no entries")]
    Empty,
}
