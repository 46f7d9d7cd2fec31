//! Conversion of markup text into typed scalar values.
//!
//! Generated setters call [`FromMarkup::from_markup`] for every text or
//! attribute value. Types that need richer coercion (dates, enums with
//! custom spellings) are handled with a custom setter instead.

use crate::error::ConvertError;

/// A type that can be built from the text of an element or attribute.
pub trait FromMarkup: Sized {
    fn from_markup(text: String) -> Result<Self, ConvertError>;
}

impl FromMarkup for String {
    #[inline]
    fn from_markup(text: String) -> Result<Self, ConvertError> {
        Ok(text)
    }
}

impl FromMarkup for Box<str> {
    #[inline]
    fn from_markup(text: String) -> Result<Self, ConvertError> {
        Ok(text.into_boxed_str())
    }
}

impl FromMarkup for bool {
    fn from_markup(text: String) -> Result<Self, ConvertError> {
        match text.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConvertError::new(text, "expected a boolean")),
        }
    }
}

impl FromMarkup for char {
    fn from_markup(text: String) -> Result<Self, ConvertError> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConvertError::new(text, "expected a single character")),
        }
    }
}

impl<T: FromMarkup> FromMarkup for Option<T> {
    #[inline]
    fn from_markup(text: String) -> Result<Self, ConvertError> {
        T::from_markup(text).map(Some)
    }
}

macro_rules! from_str_markup {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromMarkup for $ty {
                fn from_markup(text: String) -> Result<Self, ConvertError> {
                    text.trim()
                        .parse::<$ty>()
                        .map_err(|e| ConvertError::new(text.as_str(), e))
                }
            }
        )*
    };
}

from_str_markup!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);
