//! Cancellation and deadlines for store reads.
//!
//! A [`Context`] is passed to the read path of the repository and the store
//! contracts. It carries an optional cancellation signal and an optional
//! deadline; [`Context::run`] races a future against both.
//!
//! ```
//! use std::time::Duration;
//!
//! use eventide_core::context::Context;
//!
//! let (ctx, cancel) = Context::with_cancel();
//! let ctx = ctx.with_timeout(Duration::from_secs(5));
//! assert!(ctx.check().is_ok());
//! cancel.cancel();
//! assert!(ctx.check().is_err());
//! ```

use std::{future::Future, time::Duration};

use tokio::{sync::watch, time::Instant};

use crate::error::Error;

#[derive(Clone, Debug, Default)]
pub struct Context {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every [`Context`] derived from the one it was created with.
///
/// Dropping the handle does not cancel.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A fresh cancellable context.
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: Some(rx),
                deadline: None,
            },
            CancelHandle(tx),
        )
    }

    /// Derive a context that also expires after `timeout`.
    ///
    /// An earlier deadline inherited from `self` is kept.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that also expires at `deadline`.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, if it is.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(Error::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Error::DeadlineExceeded);
        }
        None
    }

    /// # Errors
    ///
    /// [`Error::Cancelled`] or [`Error::DeadlineExceeded`] once the context
    /// is done.
    pub fn check(&self) -> Result<(), Error> {
        self.err().map_or(Ok(()), Err)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Never resolves for [`Context::background`].
    pub async fn done(&self) -> Error {
        let cancelled = async {
            let Some(mut rx) = self.cancel.clone() else {
                return std::future::pending().await;
            };
            loop {
                let cancelled = *rx.borrow_and_update();
                if cancelled {
                    return;
                }
                if rx.changed().await.is_err() {
                    // sender dropped without cancelling
                    return std::future::pending().await;
                }
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            () = cancelled => Error::Cancelled,
            () = expired => Error::DeadlineExceeded,
        }
    }

    /// Run `fut` unless the context finishes first.
    ///
    /// The context is checked before polling `fut` and again after it
    /// completes, so a result produced after cancellation is discarded.
    ///
    /// # Errors
    ///
    /// The error of `fut`, or the context's error.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        self.check()?;
        let result = tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        };
        self.check()?;
        result
    }
}
