use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Resolves once the user asks the process to stop (Ctrl+C or SIGTERM).
#[derive(Clone, Default)]
pub struct InterruptSignal {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl InterruptSignal {
    /// Installs the signal handlers. Must be called from within the runtime.
    pub fn install() -> Result<Self> {
        let signal = Self::default();
        signal.setup_signal_handlers()?;
        Ok(signal)
    }

    fn setup_signal_handlers(&self) -> Result<()> {
        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGINT, SIGTERM};
            use signal_hook::iterator::Signals;

            let mut signals = Signals::new([SIGTERM, SIGINT])?;
            let signal = self.clone();

            std::thread::spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    info!("Received shutdown signal ({}), stopping collection", sig);
                    signal.trigger();
                }
            });
        }

        #[cfg(not(unix))]
        {
            let signal = self.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, stopping collection");
                    signal.trigger();
                }
            });
        }

        Ok(())
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        // notify_one keeps a permit if nobody is waiting yet
        self.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub async fn triggered(&self) {
        if self.is_triggered() {
            return;
        }
        self.notify.notified().await;
    }
}
