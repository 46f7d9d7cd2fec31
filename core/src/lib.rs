#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
pub mod config;
mod dispatch;
mod document;
mod error;
mod lazy;
mod mapped;
mod markup;
pub mod queue;
pub mod schema;

pub use config::{DepthGuard, ParseOptions};
pub use dispatch::Input;
pub use document::{Completion, Parsing, SaxDocument};
pub use error::{ConvertError, Error};
pub use lazy::{Lazy, LazySeq};
pub use mapped::{Item, Mapped};
pub use markup::FromMarkup;
pub use queue::{CancelToken, Handoff};
pub use schema::{Accessor, FieldDescriptor, FieldKind, FieldOptions, NestedType, Schema, SchemaBuilder, Source};
