// Cooperative interruption: set once, observed between units of work

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process exit status after an interrupt (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Shared stop flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The first Ctrl-C stops the run at its next safe point; a second one
    /// exits immediately, even mid-request.
    pub fn watch_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        self.watch(tokio::signal::ctrl_c, || std::process::exit(EXIT_INTERRUPTED))
    }

    fn watch<S, F, X>(&self, mut signal: S, force_exit: X) -> tokio::task::JoinHandle<()>
    where
        S: FnMut() -> F + Send + 'static,
        F: Future<Output = std::io::Result<()>> + Send,
        X: FnOnce() + Send + 'static,
    {
        let interrupt = self.clone();
        tokio::spawn(async move {
            if let Err(e) = signal().await {
                tracing::error!("cannot listen for Ctrl-C: {}", e);
                return;
            }
            tracing::warn!("interrupt received, stopping after the current sentence (press Ctrl-C again to quit now)");
            interrupt.trigger();

            if signal().await.is_ok() {
                tracing::warn!("second interrupt, exiting");
                force_exit();
            }
        })
    }
}
