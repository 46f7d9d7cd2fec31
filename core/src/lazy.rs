//! Lazy collection fields and the sequence that drains them.
//!
//! A struct declares at most one [`Lazy<T>`] field. While a parse runs, the
//! field is attached to the producing half of the handoff queue and every
//! appended element is pushed to the consumer instead of being stored. The
//! consumer reads those elements from the [`LazySeq<T>`] returned by
//! [`Parsing::lazy`](crate::Parsing::lazy).

use std::fmt;

use crate::error::Error;
use crate::queue::{Consumer, Handoff, Producer};

/// A collection field whose elements stream to the consumer.
///
/// Holds no elements itself. Outside a running parse it is detached and
/// [`push`](Self::push) fails with [`Error::Detached`].
pub struct Lazy<T> {
    producer: Option<Producer<T>>,
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Self { producer: None }
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("attached", &self.producer.is_some())
            .finish()
    }
}

impl<T: Send + 'static> Lazy<T> {
    pub fn attach(&mut self, producer: Producer<T>) {
        self.producer = Some(producer);
    }

    pub fn detach(&mut self) {
        self.producer = None;
    }

    pub fn is_attached(&self) -> bool {
        self.producer.is_some()
    }

    /// Hand one element to the consumer, blocking until the slot is free.
    pub fn push(&mut self, value: T) -> Result<(), Error> {
        match &self.producer {
            Some(producer) => producer.produce(value),
            None => Err(Error::Detached),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeqState {
    Streaming,
    /// A failure was yielded; the trailing end-of-stream is still queued.
    DrainingTail,
    Exhausted,
}

/// Single-pass, pull-based sequence over a lazy field.
///
/// Yields `Ok(value)` for every produced element in push order. A parse
/// failure is yielded exactly once as `Err`, after the last element that
/// was produced before it, and ends the sequence. Once exhausted, every
/// further call to `next` returns `None`.
pub struct LazySeq<T> {
    consumer: Consumer<T>,
    state: SeqState,
}

impl<T> fmt::Debug for LazySeq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySeq").field("state", &self.state).finish()
    }
}

impl<T> LazySeq<T> {
    pub fn new(consumer: Consumer<T>) -> Self {
        Self {
            consumer,
            state: SeqState::Streaming,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == SeqState::Exhausted
    }

    /// Drain the remaining elements, stopping at the first failure.
    pub fn collect_all(&mut self) -> Result<Vec<T>, Error> {
        self.by_ref().collect()
    }

    fn drain_tail(&mut self) {
        // The producer pushes end-of-stream right after a failure.
        let _ = self.consumer.pop();
        self.state = SeqState::Exhausted;
    }

    fn stop(&mut self) {
        self.consumer.close();
        self.state = SeqState::Exhausted;
    }
}

impl<T> Drop for LazySeq<T> {
    fn drop(&mut self) {
        if !self.is_exhausted() {
            log::debug!("lazy sequence dropped before exhaustion, cancelling parse");
            self.consumer.cancel();
        }
    }
}

impl<T> Iterator for LazySeq<T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            SeqState::Exhausted => return None,
            SeqState::DrainingTail => {
                self.drain_tail();
                return None;
            }
            SeqState::Streaming => {}
        }

        match self.consumer.pop() {
            Ok(Handoff::Produced(value)) => Some(Ok(value)),
            Ok(Handoff::Failed(err)) => {
                self.drain_tail();
                Some(Err(err))
            }
            Ok(Handoff::EndOfStream) => {
                self.state = SeqState::Exhausted;
                None
            }
            Err(Error::Disconnected) if self.consumer.is_cancelled() => {
                self.state = SeqState::Exhausted;
                None
            }
            Err(err) => {
                self.stop();
                Some(Err(err))
            }
        }
    }
}

#[cfg(feature = "futures")]
impl<T> futures_core::Stream for LazySeq<T> {
    type Item = Result<T, Error>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        let this = self.get_mut();
        loop {
            match this.state {
                SeqState::Exhausted => return Poll::Ready(None),
                SeqState::DrainingTail => match this.consumer.poll_pop(cx) {
                    Poll::Ready(_) => this.state = SeqState::Exhausted,
                    Poll::Pending => return Poll::Pending,
                },
                SeqState::Streaming => {
                    return match this.consumer.poll_pop(cx) {
                        Poll::Ready(Some(Handoff::Produced(value))) => Poll::Ready(Some(Ok(value))),
                        Poll::Ready(Some(Handoff::Failed(err))) => {
                            this.state = SeqState::DrainingTail;
                            Poll::Ready(Some(Err(err)))
                        }
                        Poll::Ready(Some(Handoff::EndOfStream)) => {
                            this.state = SeqState::Exhausted;
                            Poll::Ready(None)
                        }
                        Poll::Ready(None) if this.consumer.is_cancelled() => {
                            this.state = SeqState::Exhausted;
                            Poll::Ready(None)
                        }
                        Poll::Ready(None) => {
                            this.state = SeqState::Exhausted;
                            Poll::Ready(Some(Err(Error::Disconnected)))
                        }
                        Poll::Pending => Poll::Pending,
                    };
                }
            }
        }
    }
}
