//! Parse options for resource limits and queue behavior.
//!
//! This module provides [`ParseOptions`] for controlling a background
//! parse, including the nesting limit that protects against deeply nested
//! input and the optional timeouts on the handoff queue.
//!
//! # Nesting Limits
//!
//! Every nested object opened by the dispatcher increments a depth counter.
//! Following the pattern established by `serde_json`, the default limit of
//! 128 balances safety with practical documents.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use saxmap_core::config::ParseOptions;
//!
//! // Default: depth 128, whitespace trimmed, no timeouts
//! let options = ParseOptions::default();
//!
//! // Give up if the consumer stops pulling for five seconds
//! let options = ParseOptions::new()
//!     .with_push_timeout(Some(Duration::from_secs(5)));
//! ```

use std::time::Duration;

use crate::Error;

/// Options for a single parse invocation.
///
/// # Default Values
///
/// | Setting | Default | Rationale |
/// |---------|---------|-----------|
/// | `max_depth` | 128 | Matches serde_json's recursion default |
/// | `trim_text` | `true` | Indentation is not content |
/// | `push_timeout` | `None` | Producer waits for the consumer indefinitely |
/// | `pop_timeout` | `None` | Consumer waits for the producer indefinitely |
///
/// # Blocking
///
/// Without timeouts, a producer whose consumer stops pulling waits until
/// the consumer pulls again, drops the lazy sequence, or cancels. Setting
/// `push_timeout` bounds that wait; setting `pop_timeout` bounds the
/// consumer's wait on a stalled producer.
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum nesting of mapped sub-objects.
    ///
    /// Exceeding it fails the parse with [`Error::DepthLimitExceeded`].
    pub max_depth: usize,

    /// Strip leading and trailing whitespace from text events.
    pub trim_text: bool,

    /// Upper bound on a single push into the handoff queue.
    pub push_timeout: Option<Duration>,

    /// Upper bound on a single pull from the lazy sequence.
    pub pop_timeout: Option<Duration>,
}

impl Default for ParseOptions {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ParseOptions {
    /// Default options, usable in const contexts.
    pub const DEFAULT: Self = Self {
        max_depth: 128,
        trim_text: true,
        push_timeout: None,
        pop_timeout: None,
    };

    #[inline]
    pub const fn new() -> Self {
        Self::DEFAULT
    }

    /// Sets the maximum nesting depth. `usize::MAX` disables the limit.
    #[inline]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[inline]
    pub const fn with_trim_text(mut self, trim: bool) -> Self {
        self.trim_text = trim;
        self
    }

    #[inline]
    pub const fn with_push_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.push_timeout = timeout;
        self
    }

    #[inline]
    pub const fn with_pop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pop_timeout = timeout;
        self
    }

    /// Disables the nesting limit.
    ///
    /// # Warning
    ///
    /// Only use this for trusted input.
    #[inline]
    pub const fn disable_depth_limit(self) -> Self {
        self.with_max_depth(usize::MAX)
    }
}

/// Tracks how many nested objects are open.
///
/// Pairs with [`ParseOptions::max_depth`] to provide the limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthGuard {
    depth: usize,
}

impl DepthGuard {
    #[inline]
    pub const fn new() -> Self {
        Self { depth: 0 }
    }

    #[inline]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Enter a nested object, incrementing depth.
    ///
    /// Returns `Err(Error::DepthLimitExceeded)` if the new depth would
    /// exceed `limit`.
    #[inline]
    pub fn enter(&mut self, limit: usize) -> Result<(), Error> {
        self.depth = self.depth.saturating_add(1);
        if self.depth > limit {
            Err(Error::DepthLimitExceeded {
                depth: self.depth,
                limit,
            })
        } else {
            Ok(())
        }
    }

    /// Leave a nested object. Saturates at zero.
    #[inline]
    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
