//! Synchronization primitives for the engine session.
//!
//! Every caller that suspends on the session holds the receiving half of a
//! oneshot channel. The helpers here make sure each sender is used exactly
//! once, whichever path (success, failure, teardown) gets to it first.

use tokio::sync::oneshot;

use crate::error::EngineError;

/// Sending half of a caller's pending result.
pub type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Deliver a result; a caller that stopped waiting is not an error.
pub fn resolve<T>(reply: Reply<T>, result: Result<T, EngineError>) {
    let _ = reply.send(result);
}

/// Callers sharing one in-flight operation.
#[derive(Debug)]
pub struct Waiters<T> {
    pending: Vec<Reply<T>>,
}

impl<T: Clone> Waiters<T> {
    #[must_use]
    pub fn new() -> Self {
        Waiters {
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, reply: Reply<T>) {
        self.pending.push(reply);
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Hand the same outcome to every waiter and empty the list.
    pub fn resolve_all(&mut self, result: &Result<T, EngineError>) {
        for reply in self.pending.drain(..) {
            resolve(reply, result.clone());
        }
    }
}

impl<T: Clone> Default for Waiters<T> {
    fn default() -> Self {
        Self::new()
    }
}
