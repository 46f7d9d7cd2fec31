//! Single-slot handoff queue between the parse thread and its consumer.
//!
//! The queue is a `tokio::sync::mpsc` channel with capacity
//! [`HANDOFF_CAPACITY`] (one). A push completes as soon as the slot is
//! free, so the producer is at most one item ahead of the consumer; a slow
//! consumer throttles the producer without any unbounded buffering.
//!
//! Both halves are used from plain threads. The consumer blocks with
//! `blocking_recv` unless a pop timeout is configured. The producer drives
//! each push on its own current-thread runtime so that a push can race
//! against cancellation and an optional timeout:
//!
//! ```text
//!  parse thread                         caller
//!  ------------                         ------
//!  push(Produced(a)) --> [ slot ] --> pop -> a
//!  push(Produced(b))     (waits until a is popped)
//!  push(Failed(e))   --> [ slot ] --> pop -> e
//!  push(EndOfStream) --> [ slot ] --> pop (drained internally)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, watch};

use crate::error::Error;

/// Number of items the queue holds between producer and consumer.
pub const HANDOFF_CAPACITY: usize = 1;

/// One item crossing the queue.
#[derive(Debug)]
pub enum Handoff<T> {
    Produced(T),
    /// Terminal failure. Always followed by `EndOfStream`.
    Failed(Error),
    /// Always the last item pushed.
    EndOfStream,
}

/// Shared cancellation flag, observed at every push and every parse event.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut watcher = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = watcher.wait_for(|cancelled| *cancelled).await;
    }
}

/// Create the raw channel for one parse invocation.
pub fn bounded<T>() -> (mpsc::Sender<Handoff<T>>, mpsc::Receiver<Handoff<T>>) {
    mpsc::channel(HANDOFF_CAPACITY)
}

/// Pushing half, owned by the parse thread and attached to the lazy field.
pub struct Producer<T> {
    tx: mpsc::Sender<Handoff<T>>,
    runtime: Arc<Runtime>,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            runtime: Arc::clone(&self.runtime),
            cancel: self.cancel.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Send + 'static> Producer<T> {
    /// Wrap a sender. Builds the runtime that drives each push.
    pub fn new(
        tx: mpsc::Sender<Handoff<T>>,
        cancel: CancelToken,
        timeout: Option<Duration>,
    ) -> Result<Self, Error> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self {
            tx,
            runtime: Arc::new(runtime),
            cancel,
            timeout,
        })
    }

    /// Push one item, blocking while the slot is occupied.
    ///
    /// Fails with [`Error::Cancelled`] if the parse was cancelled or the
    /// consumer dropped its half, and with [`Error::Timeout`] if the slot
    /// stayed occupied longer than the push timeout.
    pub fn push(&self, item: Handoff<T>) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let outcome = self.runtime.block_on(self.deliver(item));
        if let Err(err) = &outcome {
            log::warn!("handoff push abandoned: {err}");
        }
        outcome
    }

    pub fn produce(&self, value: T) -> Result<(), Error> {
        self.push(Handoff::Produced(value))
    }

    pub fn fail(&self, err: Error) -> Result<(), Error> {
        self.push(Handoff::Failed(err))
    }

    pub fn end(&self) -> Result<(), Error> {
        self.push(Handoff::EndOfStream)
    }

    async fn deliver(&self, item: Handoff<T>) -> Result<(), Error> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| Error::Cancelled),
            () = expire(self.timeout) => Err(Error::Timeout),
        }
    }
}

async fn expire(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

/// Popping half, wrapped by [`LazySeq`](crate::LazySeq).
pub struct Consumer<T> {
    rx: mpsc::Receiver<Handoff<T>>,
    cancel: CancelToken,
    timeout: Option<Duration>,
    runtime: Option<Runtime>,
}

impl<T> Consumer<T> {
    pub fn new(rx: mpsc::Receiver<Handoff<T>>, cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self {
            rx,
            cancel,
            timeout,
            runtime: None,
        }
    }

    /// Pop one item, blocking while the slot is empty.
    ///
    /// Must not be called from inside an async runtime; use the `Stream`
    /// implementation of `LazySeq` there.
    pub fn pop(&mut self) -> Result<Handoff<T>, Error> {
        let received = match self.timeout {
            None => self.rx.blocking_recv(),
            Some(limit) => {
                let runtime = match self.runtime.take() {
                    Some(runtime) => runtime,
                    None => Builder::new_current_thread().enable_time().build()?,
                };
                let received = runtime.block_on(async { tokio::time::timeout(limit, self.rx.recv()).await });
                self.runtime = Some(runtime);
                received.map_err(|_| Error::Timeout)?
            }
        };
        received.ok_or(Error::Disconnected)
    }

    /// Stop accepting items. Pending and future pushes fail.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the parse feeding this queue.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(feature = "futures")]
    pub(crate) fn poll_pop(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Handoff<T>>> {
        self.rx.poll_recv(cx)
    }
}
