//! Process-wide interrupt dispatch.
//!
//! One listener owns Ctrl-C for the whole run. What an interrupt does
//! depends on a single piece of shared state: whether a cancellable
//! operation (a verification process or a pending prompt) is outstanding.
//! If one is, that operation alone is cancelled; if not, the program exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

/// What the listener decided to do with a delivered interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// A cancellable operation was outstanding and has been signalled.
    CancelPending,

    /// Nothing was outstanding; the program exits.
    ExitProgram,
}

/// Cloneable handle to the interrupt state.
#[derive(Clone, Default)]
pub struct InterruptHandle {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    armed: AtomicBool,
    cancel: Notify,
}

impl InterruptHandle {
    /// Create a handle with no listener attached. Tests drive delivery
    /// through [`InterruptHandle::deliver`] directly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the Ctrl-C listener for this handle.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                match handle.deliver() {
                    InterruptAction::CancelPending => {}
                    InterruptAction::ExitProgram => std::process::exit(0),
                }
            }
        })
    }

    /// Mark a cancellable operation as outstanding for the guard's
    /// lifetime.
    pub fn arm(&self) -> ArmedGuard<'_> {
        self.inner.armed.store(true, Ordering::SeqCst);
        ArmedGuard { inner: &self.inner }
    }

    /// Resolves when an interrupt is delivered to an armed operation.
    pub async fn cancelled(&self) {
        self.inner.cancel.notified().await;
    }

    /// Route one delivered interrupt.
    ///
    /// Disarms on delivery, so back-to-back interrupts cancel the pending
    /// operation once and then exit.
    pub fn deliver(&self) -> InterruptAction {
        if self.inner.armed.swap(false, Ordering::SeqCst) {
            debug!("interrupt: cancelling outstanding operation");
            // notify_one stores a permit if the waiter has not polled yet
            self.inner.cancel.notify_one();
            InterruptAction::CancelPending
        } else {
            debug!("interrupt: nothing outstanding");
            InterruptAction::ExitProgram
        }
    }
}

/// RAII marker for an outstanding cancellable operation.
pub struct ArmedGuard<'a> {
    inner: &'a Inner,
}

impl Drop for ArmedGuard<'_> {
    fn drop(&mut self) {
        self.inner.armed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_deliver_unarmed_requests_exit() {
        let handle = InterruptHandle::new();
        assert_eq!(handle.deliver(), InterruptAction::ExitProgram);
    }

    #[tokio::test]
    async fn test_deliver_armed_cancels_and_disarms() {
        let handle = InterruptHandle::new();
        let guard = handle.arm();

        assert_eq!(handle.deliver(), InterruptAction::CancelPending);

        // The stored permit completes the wait even though delivery came
        // before the await.
        tokio::time::timeout(Duration::from_secs(1), handle.cancelled())
            .await
            .expect("cancellation was not observed");

        // Second interrupt finds nothing outstanding.
        assert_eq!(handle.deliver(), InterruptAction::ExitProgram);
        drop(guard);
    }

    #[tokio::test]
    async fn test_guard_drop_disarms() {
        let handle = InterruptHandle::new();
        {
            let _guard = handle.arm();
        }
        assert_eq!(handle.deliver(), InterruptAction::ExitProgram);
    }

    #[tokio::test]
    async fn test_rearm_after_cancelled_operation() {
        let handle = InterruptHandle::new();

        let guard = handle.arm();
        assert_eq!(handle.deliver(), InterruptAction::CancelPending);
        handle.cancelled().await;
        drop(guard);

        let _guard = handle.arm();
        assert_eq!(handle.deliver(), InterruptAction::CancelPending);
    }
}
