use crate::accumulator::Progress;
use browser::PageSession;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollBudget {
    pub max_iterations: u32,
    pub pause: Duration,
}

impl Default for ScrollBudget {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            pause: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    PageExhausted,
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub iterations: u32,
    pub failed_gestures: u32,
    pub reason: StopReason,
}

/// Scrolls the page to make it request more items, pausing between gestures
/// so the responses can be intercepted.
#[derive(Debug, Clone)]
pub struct ScrollDriver {
    pub budget: ScrollBudget,
    pub distance: i64,
    pub settle: Duration,
    pub stop_on_exhausted: bool,
}

impl Default for ScrollDriver {
    fn default() -> Self {
        Self {
            budget: ScrollBudget::default(),
            distance: 5000,
            settle: Duration::from_secs(5),
            stop_on_exhausted: true,
        }
    }
}

impl ScrollDriver {
    pub async fn run<P>(&self, page: &P, mut progress: watch::Receiver<Progress>) -> ScrollOutcome
    where
        P: PageSession + ?Sized,
    {
        let mut iterations = 0;
        let mut failed_gestures = 0;

        let reason = loop {
            if let Some(reason) = self.stop_reason(&progress.borrow_and_update()) {
                break reason;
            }
            if iterations >= self.budget.max_iterations {
                break StopReason::BudgetExhausted;
            }

            iterations += 1;
            info!("Scrolling... ({}/{})", iterations, self.budget.max_iterations);
            if let Err(e) = page.scroll_by(self.distance) {
                warn!("Scroll gesture {} failed: {}", iterations, e);
                failed_gestures += 1;
            }

            self.pause(&mut progress).await;
        };

        info!(
            "Done scrolling after {} iterations ({:?}). Waiting for final responses...",
            iterations, reason
        );
        sleep(self.settle).await;

        ScrollOutcome {
            iterations,
            failed_gestures,
            reason,
        }
    }

    fn stop_reason(&self, progress: &Progress) -> Option<StopReason> {
        if progress.complete {
            Some(StopReason::TargetReached)
        } else if progress.exhausted && self.stop_on_exhausted {
            Some(StopReason::PageExhausted)
        } else {
            None
        }
    }

    // Ends early once progress says there is no point in scrolling further.
    async fn pause(&self, progress: &mut watch::Receiver<Progress>) {
        let pause = sleep(self.budget.pause);
        tokio::pin!(pause);

        loop {
            tokio::select! {
                _ = &mut pause => return,
                changed = progress.changed() => {
                    if changed.is_err() {
                        (&mut pause).await;
                        return;
                    }
                    let snapshot = *progress.borrow();
                    debug!("{} videos collected", snapshot.collected);
                    if self.stop_reason(&snapshot).is_some() {
                        return;
                    }
                }
            }
        }
    }
}
