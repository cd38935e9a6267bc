//! Single-shot handoff of a command's outcome from the connection to the caller.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Create a connected [`Completer`] / [`Completion`] pair
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Completer {
            state: BridgeState::Pending(tx),
        },
        Completion { rx },
    )
}

enum BridgeState<T> {
    Pending(oneshot::Sender<Result<T>>),
    Resolved,
    Failed,
}

/// Resolving side, held by whoever consumes the response packets
///
/// Exactly one of [`Completer::complete`] or [`Completer::fail`] takes effect. Dropping a
/// pending `Completer` resolves the [`Completion`] with [`Error::IncompleteResponse`].
pub struct Completer<T> {
    state: BridgeState<T>,
}

impl<T> Completer<T> {
    /// Deliver the value. Returns `false` if the bridge was already resolved.
    pub fn complete(&mut self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    /// Deliver the error. Returns `false` if the bridge was already resolved.
    pub fn fail(&mut self, err: Error) -> bool {
        self.resolve(Err(err))
    }

    /// Deliver either outcome
    pub fn resolve(&mut self, result: Result<T>) -> bool {
        let next = if result.is_ok() {
            BridgeState::Resolved
        } else {
            BridgeState::Failed
        };
        match std::mem::replace(&mut self.state, next) {
            BridgeState::Pending(tx) => {
                // the caller may have stopped waiting; that is not our error
                let _ = tx.send(result);
                true
            }
            previous => {
                tracing::warn!("completion bridge resolved twice; dropping the second result");
                self.state = previous;
                false
            }
        }
    }

    /// Whether the waiting side has gone away
    pub fn is_abandoned(&self) -> bool {
        match &self.state {
            BridgeState::Pending(tx) => tx.is_closed(),
            BridgeState::Resolved | BridgeState::Failed => false,
        }
    }
}

impl<T> std::fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            BridgeState::Pending(_) => "Pending",
            BridgeState::Resolved => "Resolved",
            BridgeState::Failed => "Failed",
        };
        f.debug_struct("Completer").field("state", &state).finish()
    }
}

/// Waiting side: a future resolving to the command's outcome
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_closed)) => Poll::Ready(Err(Error::IncompleteResponse)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_once() {
        let (mut completer, completion) = completion::<u32>();
        assert!(completer.complete(7));
        assert!(!completer.complete(8));
        assert!(!completer.fail(Error::IncompleteResponse));
        assert_eq!(completion.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn fail_once() {
        let (mut completer, completion) = completion::<u32>();
        assert!(completer.fail(Error::BadConfigError("boom".to_string())));
        assert!(!completer.complete(1));
        assert!(matches!(completion.await, Err(Error::BadConfigError(_))));
    }

    #[tokio::test]
    async fn dropped_completer_fails_waiter() {
        let (completer, completion) = completion::<u32>();
        drop(completer);
        assert!(matches!(completion.await, Err(Error::IncompleteResponse)));
    }

    #[tokio::test]
    async fn resolved_from_another_task() {
        let (mut completer, completion) = completion::<String>();
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            completer.complete("done".to_string())
        });
        assert_eq!(completion.await.unwrap(), "done");
        assert!(handle.await.unwrap());
    }

    #[test]
    fn abandoned_waiter() {
        let (mut completer, completion) = completion::<u32>();
        assert!(!completer.is_abandoned());
        drop(completion);
        assert!(completer.is_abandoned());
        // still counts as the single resolution
        assert!(completer.complete(1));
        assert!(!completer.is_abandoned());
    }
}
