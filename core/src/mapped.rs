//! The call-in surface the dispatcher uses to populate an object.
//!
//! [`Mapped`] is object safe so the dispatcher can hold the root object and
//! every open nested object on one stack. `#[derive(SaxDocument)]` writes
//! the implementation; hand-written implementations are supported for
//! types the derive cannot express.

use std::any::Any;
use std::fmt;

use crate::error::Error;
use crate::schema::{FieldDescriptor, Schema};

/// A value handed to a field by the dispatcher.
pub enum Item {
    /// Element text, attribute value, or the object's own text.
    Text(String),
    /// A fully parsed nested object.
    Nested(Box<dyn Mapped>),
}

impl Item {
    /// Take the text, failing if a nested object arrived instead.
    pub fn into_text(self, field: &FieldDescriptor) -> Result<String, Error> {
        match self {
            Item::Text(text) => Ok(text),
            Item::Nested(_) => Err(Error::NestedTypeMismatch {
                field: field.target_name().to_string(),
            }),
        }
    }

    /// Take the nested object as a concrete `T`.
    pub fn into_nested<T: Mapped>(self, field: &FieldDescriptor) -> Result<T, Error> {
        match self {
            Item::Nested(object) => object
                .into_any()
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| Error::NestedTypeMismatch {
                    field: field.target_name().to_string(),
                }),
            Item::Text(_) => Err(Error::MissingNestedType {
                field: field.target_name().to_string(),
            }),
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Item::Nested(object) => f
                .debug_tuple("Nested")
                .field(&object.mapped_schema().type_name())
                .finish(),
        }
    }
}

/// An object the dispatcher can populate.
///
/// Scalar setters run synchronously on the parse thread. For a lazy
/// collection, `append` pushes into the handoff queue and may block until
/// the consumer pulls.
pub trait Mapped: Any + Send {
    fn mapped_schema(&self) -> &'static Schema;

    /// Populate a scalar field (element, attribute or value).
    fn set_scalar(&mut self, field: &FieldDescriptor, item: Item) -> Result<(), Error>;

    /// Append to an eager or lazy collection field.
    fn append(&mut self, field: &FieldDescriptor, item: Item) -> Result<(), Error>;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}
