use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_SLICE: Duration = Duration::from_millis(100);

/// Returned from any wait that was interrupted by the operator.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cancelled by operator")]
pub struct Aborted;

/// Abort signal shared between the Ctrl-C watcher and the tracking session.
/// Every timed wait in a session goes through [`AbortSignal::sleep`] so a
/// cancellation is observed at the next suspension point.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), Aborted> {
        if self.is_triggered() {
            Err(Aborted)
        } else {
            Ok(())
        }
    }

    pub fn sleep(&self, duration: Duration) -> Result<(), Aborted> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }

    /// Route SIGINT into this signal. The watcher owns a current-thread
    /// runtime and never touches device state.
    pub fn install_ctrl_c(&self) -> std::io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let signal = self.clone();

        thread::Builder::new()
            .name("ctrl-c".into())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        if tokio::signal::ctrl_c().await.is_err() {
                            log::warn!("Ctrl-C handler stopped, interrupts will not be caught");
                            return;
                        }
                        if signal.is_triggered() {
                            log::warn!("Shutdown already in progress");
                        } else {
                            signal.trigger();
                        }
                    }
                })
            })?;

        Ok(())
    }
}
