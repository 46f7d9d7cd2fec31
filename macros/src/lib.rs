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

//! Procedural macros for the saxmap document mapper.
//!
//! # Quick Start
//!
//! ```ignore
//! use saxmap::{Lazy, SaxDocument};
//!
//! #[derive(Debug, Default, SaxDocument)]
//! struct Items {
//!     #[sax(attribute)]
//!     name: Option<String>,
//!     #[sax(elements = "item", lazy)]
//!     items: Lazy<String>,
//! }
//! ```
use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod sax_document;

/// Derives `Mapped` and `SaxDocument` for a struct with named fields.
///
/// Fields without a `#[sax(...)]` attribute are left alone. The struct
/// must implement `Default`.
///
/// # Field attributes
///
/// Exactly one source kind per field:
///
/// | Attribute | Binds to |
/// |-----------|----------|
/// | `element` / `element = "name"` | text of the first matching descendant element |
/// | `attribute` / `attribute = "name"` | attribute of the object's own element |
/// | `value` | direct text of the object's own element |
/// | `elements` / `elements = "name"` | every matching descendant element (`Vec<T>` or `Lazy<T>`) |
///
/// The source name defaults to the field name. Options:
///
/// - `nested`: parse the element's content into the field's own
///   `SaxDocument` type (`T`, `Option<T>`, `Vec<T>` or `Lazy<T>`).
/// - `lazy`: stream an `elements` field through `Parsing::lazy`. At most
///   one per type; the field type must be `Lazy<T>`.
/// - `required`: fail the parse if the field is never populated.
/// - `value = "attr"`: take the named attribute of the matched element
///   instead of its text.
/// - `with(attr = "value", ...)`: only match elements carrying these
///   attribute values.
/// - `setter = "path"`: call `path(&mut self, String) -> Result<(), ConvertError>`
///   instead of the generated setter.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default, SaxDocument)]
/// struct Feed {
///     #[sax(attribute = "xml:lang")]
///     lang: Option<String>,
///     #[sax(element, required)]
///     title: String,
///     #[sax(element = "link", value = "href", with(rel = "alternate"))]
///     link: Option<String>,
///     #[sax(elements = "entry", nested, lazy)]
///     entries: Lazy<Entry>,
/// }
///
/// let mut parsing = Feed::parse(xml);
/// for entry in parsing.lazy() {
///     let entry = entry?;
/// }
/// let feed = parsing.finish()?;
/// ```
#[proc_macro_derive(SaxDocument, attributes(sax))]
pub fn derive_sax_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    sax_document::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
