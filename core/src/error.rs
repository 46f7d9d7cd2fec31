//! Core error types for saxmap.
//!
//! Every failure raised while a document is being mapped ends up as an
//! [`Error`]. The type is `Clone` because a single failure is reported
//! through two surfaces: the lazy sequence (once, at the point iteration
//! reaches it) and [`Parsing::finish`](crate::Parsing::finish).

use std::sync::Arc;

use thiserror::Error;

use crate::schema::FieldDescriptor;

/// Core saxmap error type.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The XML tokenizer rejected the input.
    #[error("xml error: {0}")]
    Xml(Arc<quick_xml::Error>),

    /// Reading the input, or starting the background parse, failed.
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    /// A text value could not be converted into the field's type.
    #[error("cannot convert {value:?} for field `{field}`: {reason}")]
    Convert {
        /// Target name of the field being populated.
        field: String,
        /// The raw markup text.
        value: String,
        /// Why the conversion failed.
        reason: String,
    },

    /// A field needs a nested object but received plain text.
    #[error("field `{field}` has no nested type to parse its content into")]
    MissingNestedType {
        /// Target name of the field.
        field: String,
    },

    /// A nested object of the wrong type was delivered to a field.
    #[error("field `{field}` received a nested object of an unexpected type")]
    NestedTypeMismatch {
        /// Target name of the field.
        field: String,
    },

    /// The mapped object has no accessor for the requested target name.
    #[error("`{type_name}` has no field `{field}`")]
    UnknownField {
        /// Name of the mapped type.
        type_name: &'static str,
        /// Requested target name.
        field: String,
    },

    /// The document ended while elements were still open.
    #[error("unexpected end of document inside <{element}>")]
    UnexpectedEof {
        /// Innermost element left open.
        element: String,
    },

    /// A field declared `required` was never populated.
    #[error("required field `{field}` of `{type_name}` was not populated")]
    MissingRequired {
        /// Name of the mapped type.
        type_name: &'static str,
        /// Target name of the missing field.
        field: &'static str,
    },

    /// Nested objects exceeded the configured depth.
    ///
    /// Guards against stack and memory exhaustion from deeply nested
    /// malicious input.
    #[error("nesting depth exceeded: depth {depth} > limit {limit}")]
    DepthLimitExceeded {
        /// Depth reached.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The parse was cancelled, or its consumer abandoned the lazy sequence.
    #[error("parse cancelled")]
    Cancelled,

    /// A push or pop on the handoff queue exceeded its timeout.
    #[error("timed out waiting on the handoff queue")]
    Timeout,

    /// The producer went away without signalling end of stream.
    #[error("handoff queue closed before end of stream")]
    Disconnected,

    /// A lazy field was pushed to while no parse was attached to it.
    #[error("lazy field is not attached to a running parse")]
    Detached,

    /// The background parse thread panicked.
    #[error("background parse panicked")]
    Panicked,
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(Arc::new(err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(Arc::new(quick_xml::Error::from(err)))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

/// Failure to convert markup text into a typed value.
///
/// Returned by [`FromMarkup`](crate::FromMarkup) implementations and custom
/// setters; attached to a field with [`ConvertError::into_error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert {value:?}: {reason}")]
pub struct ConvertError {
    value: String,
    reason: String,
}

impl ConvertError {
    pub fn new(value: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Attach the field being populated.
    pub fn into_error(self, field: &FieldDescriptor) -> Error {
        Error::Convert {
            field: field.target_name().to_string(),
            value: self.value,
            reason: self.reason,
        }
    }
}
