//! One-shot completion handles for asynchronous cache operations.
//!
//! Every asynchronous operation resolves exactly once. The handle can be
//! awaited from async code or waited on from a plain thread.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::cache::types::CacheError;

/// Callback invoked by a disk worker when an operation finishes.
pub type Callback<T> = Box<dyn FnOnce(Result<T, CacheError>) + Send + 'static>;

/// Pending result of an asynchronous cache operation.
///
/// Dropping the handle does not cancel the operation.
#[must_use = "the operation runs regardless; await the completion to observe its result"]
#[derive(Debug)]
pub struct Completion<T> {
    receiver: oneshot::Receiver<Result<T, CacheError>>,
}

impl<T: Send + 'static> Completion<T> {
    /// Create a completion together with the callback that resolves it.
    pub fn channel() -> (Callback<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        let callback: Callback<T> = Box::new(move |result| {
            // The caller may have dropped the handle; that is fine.
            let _ = sender.send(result);
        });
        (callback, Self { receiver })
    }

    /// A completion that has already resolved.
    pub fn ready(result: Result<T, CacheError>) -> Self {
        let (callback, completion) = Self::channel();
        callback(result);
        completion
    }

    /// Block the current thread until the operation finishes.
    ///
    /// Must not be called from within an async runtime; `.await` there instead.
    pub fn wait(self) -> Result<T, CacheError> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(CacheError::WorkerUnavailable))
    }

    /// Return the result if it is already available.
    pub fn try_take(&mut self) -> Option<Result<T, CacheError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CacheError::WorkerUnavailable)),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, CacheError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CacheError::WorkerUnavailable)))
    }
}
