//! Single-shot completion handle resolved once rendering settles.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::error::SettleError;

/// Future resolving after a run-loop sweep finds every renderer valid.
///
/// Clones observe the same signal.
#[derive(Clone)]
pub struct Settled {
    inner: Shared<oneshot::Receiver<()>>,
}

impl Future for Settled {
    type Output = Result<(), SettleError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner
            .poll_unpin(cx)
            .map(|outcome| outcome.map_err(|_| SettleError))
    }
}

impl fmt::Debug for Settled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled").finish_non_exhaustive()
    }
}

/// The outstanding signal held by the registry until it is resolved.
pub(crate) struct SettleSignal {
    sender: oneshot::Sender<()>,
    settled: Settled,
}

impl SettleSignal {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender,
            settled: Settled {
                inner: receiver.shared(),
            },
        }
    }

    pub(crate) fn settled(&self) -> Settled {
        self.settled.clone()
    }

    pub(crate) fn resolve(self) {
        // Every waiter may already be gone.
        let _ = self.sender.send(());
    }
}
