use tokio::sync::watch;

/// One-shot notification fired when a sandbox goes away.
///
/// Any number of tasks may wait on it. Once fired it stays fired, so a waiter
/// that subscribes late returns immediately.
#[derive(Debug)]
pub struct ExitSignal {
    tx: watch::Sender<bool>,
}

impl Default for ExitSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub fn signal(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_signaled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Dropping the future (e.g. on timeout) has
    /// no effect on the signal or on other waiters.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}
