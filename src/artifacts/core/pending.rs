//! Pending results
//!
//! A [`Pending`] is the receiving half of a one-shot channel. A host thread either
//! blocks on it, or keeps its own event loop turning with
//! [`Pending::wait_servicing`] until the worker hands the result over.

use crate::artifacts::core::cancellation::CancellationToken;
use crate::errors::{Error, Result};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// One iteration of a host-owned event loop
pub trait EventLoop {
    fn service(&mut self);
}

impl<F: FnMut()> EventLoop for F {
    fn service(&mut self) {
        self()
    }
}

/// Sending half, consumed by delivering the result
#[derive(Debug)]
pub struct Completer<T> {
    sender: oneshot::Sender<Result<T>>,
}

impl<T> Completer<T> {
    pub fn complete(self, result: Result<T>) {
        if self.sender.send(result).is_err() {
            tracing::debug!("pending result dropped before completion");
        }
    }
}

#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
    cancel: CancellationToken,
}

/// Create a connected completer/pending pair observing `cancel`
pub fn pending<T>(cancel: CancellationToken) -> (Completer<T>, Pending<T>) {
    let (sender, receiver) = oneshot::channel();
    (Completer { sender }, Pending { receiver, cancel })
}

impl<T> Pending<T> {
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The result if it has already arrived
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Closed) => Some(Err(Error::Cancelled)),
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Block the calling thread until the result arrives
    ///
    /// Must not be called from within an async runtime.
    pub fn wait(self) -> Result<T> {
        self.receiver.blocking_recv().map_err(|_| Error::Cancelled)?
    }

    /// Service `event_loop` until the result arrives
    ///
    /// Fails with [`Error::Cancelled`] when the completer is dropped without a result
    /// or the cancellation token is raised first.
    pub fn wait_servicing(mut self, event_loop: &mut impl EventLoop) -> Result<T> {
        loop {
            if let Some(result) = self.try_take() {
                return result;
            }
            self.cancel.check()?;
            event_loop.service();
        }
    }
}

/// Run `job` on a worker thread, handing back a [`Pending`] for its result
pub fn run_pending<T, F>(cancel: CancellationToken, job: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
{
    let (completer, pending) = pending(cancel.clone());

    std::thread::spawn(move || {
        let result = job(&cancel);
        completer.complete(result);
    });

    pending
}
