use crate::accumulator::{Accumulator, CollectionState, Progress, VideoRecord};
use crate::error::CollectError;
use crate::interceptor::{ResponseInterceptor, DEFAULT_ENDPOINT_PATTERN};
use crate::payload::ItemListPage;
use crate::profile::Profile;
use crate::scroll::{ScrollBudget, ScrollDriver, ScrollOutcome, StopReason};
use browser::PageSession;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Stop once this many unique videos are collected. `None` collects everything.
    pub target: Option<usize>,
    pub budget: ScrollBudget,
    pub settle: Duration,
    pub initial_wait: Duration,
    pub scroll_distance: i64,
    pub endpoint_pattern: String,
    pub stop_on_exhausted: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            target: None,
            budget: ScrollBudget::default(),
            settle: Duration::from_secs(5),
            initial_wait: Duration::from_secs(3),
            scroll_distance: 5000,
            endpoint_pattern: DEFAULT_ENDPOINT_PATTERN.to_string(),
            stop_on_exhausted: true,
        }
    }
}

impl CollectConfig {
    fn scroll_driver(&self) -> ScrollDriver {
        ScrollDriver {
            budget: self.budget,
            distance: self.scroll_distance,
            settle: self.settle,
            stop_on_exhausted: self.stop_on_exhausted,
        }
    }
}

#[derive(Debug)]
pub enum Termination {
    TargetReached,
    PageExhausted,
    BudgetExhausted,
    Interrupted,
    Failed(CollectError),
}

impl From<StopReason> for Termination {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::TargetReached => Termination::TargetReached,
            StopReason::PageExhausted => Termination::PageExhausted,
            StopReason::BudgetExhausted => Termination::BudgetExhausted,
        }
    }
}

#[derive(Debug)]
pub struct CollectionReport {
    pub records: Vec<VideoRecord>,
    pub complete: bool,
    pub termination: Termination,
    /// Absent when the run failed or was interrupted before scrolling finished.
    pub scroll: Option<ScrollOutcome>,
}

/// One collection pass over a profile page.
pub struct CollectionRun<'a, P: PageSession + ?Sized> {
    page: &'a P,
    profile: Profile,
    config: CollectConfig,
    accumulator: Accumulator,
}

impl<'a, P: PageSession + ?Sized> CollectionRun<'a, P> {
    pub fn new(page: &'a P, profile: Profile, config: CollectConfig) -> Self {
        let accumulator = Accumulator::new(profile.clone(), config.target);
        Self {
            page,
            profile,
            config,
            accumulator,
        }
    }

    /// Live view of the collection, usable while `run` is in progress.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.accumulator.subscribe()
    }

    /// Drives the page until the target is met, the page runs dry, the scroll
    /// budget is spent, or `interrupt` resolves. The page is always closed
    /// before returning, and records collected so far are always returned.
    pub async fn run<F>(self, interrupt: F) -> CollectionReport
    where
        F: Future<Output = ()>,
    {
        let CollectionRun {
            page,
            profile,
            config,
            accumulator,
        } = self;

        let progress = accumulator.subscribe();
        let (payload_tx, payload_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = tokio::spawn(accumulator.consume(payload_rx, shutdown_rx));

        let interceptor = ResponseInterceptor::new(config.endpoint_pattern.clone());
        let driver = config.scroll_driver();

        let mut scroll = None;
        let termination = tokio::select! {
            result = drive(page, &profile, &config, &interceptor, &driver, payload_tx, progress) => match result {
                Ok(outcome) => {
                    scroll = Some(outcome);
                    Termination::from(outcome.reason)
                }
                Err(e) => {
                    error!("Collection aborted: {}", e);
                    Termination::Failed(e)
                }
            },
            _ = interrupt => {
                warn!("Interrupted, stopping collection");
                Termination::Interrupted
            }
        };

        if let Err(e) = page.close() {
            warn!("Failed to close page: {}", e);
        }
        let _ = shutdown_tx.send(());

        let (records, complete, termination) = match worker.await {
            Ok(state) => finish(state, termination),
            Err(e) => (
                Vec::new(),
                false,
                Termination::Failed(CollectError::Worker(e.to_string())),
            ),
        };
        info!("Collected {} videos from @{}", records.len(), profile.handle());

        CollectionReport {
            records,
            complete,
            termination,
            scroll,
        }
    }
}

async fn drive<P>(
    page: &P,
    profile: &Profile,
    config: &CollectConfig,
    interceptor: &ResponseInterceptor,
    driver: &ScrollDriver,
    payloads: mpsc::UnboundedSender<ItemListPage>,
    progress: watch::Receiver<Progress>,
) -> Result<ScrollOutcome, CollectError>
where
    P: PageSession + ?Sized,
{
    interceptor
        .attach(page, payloads)
        .map_err(CollectError::Interception)?;

    info!("Opening profile page: {}", profile.url());
    blocking(|| page.navigate(profile.url())).map_err(CollectError::Navigation)?;
    sleep(config.initial_wait).await;

    Ok(driver.run(page, progress).await)
}

// Page calls block until the browser answers. On a multi-thread runtime the
// accumulator worker keeps running on another thread meanwhile.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

fn finish(state: CollectionState, termination: Termination) -> (Vec<VideoRecord>, bool, Termination) {
    let complete = state.is_complete();
    // The target can be met while the final settle wait is running, and an
    // interrupt arriving after that does not undo it.
    let termination = match termination {
        Termination::BudgetExhausted | Termination::PageExhausted | Termination::Interrupted
            if complete =>
        {
            Termination::TargetReached
        }
        other => other,
    };
    (state.into_records(), complete, termination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, FakeResponse, LISTING_URL};
    use std::future::pending;

    fn profile() -> Profile {
        Profile::parse("https://www.tiktok.com/@diggle").unwrap()
    }

    fn config(target: Option<usize>, max_iterations: u32) -> CollectConfig {
        CollectConfig {
            target,
            budget: ScrollBudget {
                max_iterations,
                pause: Duration::from_secs(2),
            },
            ..CollectConfig::default()
        }
    }

    fn ids(report: &CollectionReport) -> Vec<String> {
        report
            .records
            .iter()
            .map(|r| r.video_url.rsplit('/').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = CollectConfig::default();
        assert_eq!(config.target, None);
        assert_eq!(config.budget.max_iterations, 20);
        assert_eq!(config.budget.pause, Duration::from_secs(2));
        assert_eq!(config.settle, Duration::from_secs(5));
        assert_eq!(config.initial_wait, Duration::from_secs(3));
        assert_eq!(config.endpoint_pattern, "/api/post/item_list/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_run_collects_in_discovery_order() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1, 2])],
            vec![
                vec![FakeResponse::listing(&[2, 3])],
                vec![FakeResponse::listing(&[3, 4]), FakeResponse::listing(&[5])],
            ],
        );

        let report = CollectionRun::new(&page, profile(), config(None, 4))
            .run(pending())
            .await;

        assert_eq!(ids(&report), vec!["1", "2", "3", "4", "5"]);
        assert!(!report.complete);
        assert!(matches!(report.termination, Termination::BudgetExhausted));
        assert_eq!(page.scrolls(), 4);
        assert_eq!(page.closes(), 1);
        assert_eq!(report.records[0].views, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_met_on_first_page() {
        let page = FakePage::new(vec![FakeResponse::listing(&[1, 2, 3])], vec![]);

        let report = CollectionRun::new(&page, profile(), config(Some(2), 20))
            .run(pending())
            .await;

        assert_eq!(ids(&report), vec!["1", "2"]);
        assert!(report.complete);
        assert!(matches!(report.termination, Termination::TargetReached));
        assert_eq!(page.scrolls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_met_while_scrolling() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1])],
            vec![
                vec![FakeResponse::listing(&[1, 2])],
                vec![FakeResponse::listing(&[3, 4])],
                vec![FakeResponse::listing(&[5, 6])],
            ],
        );

        let report = CollectionRun::new(&page, profile(), config(Some(3), 20))
            .run(pending())
            .await;

        assert_eq!(ids(&report), vec!["1", "2", "3"]);
        assert!(matches!(report.termination, Termination::TargetReached));
        assert_eq!(page.scrolls(), 2);
        assert_eq!(report.scroll.unwrap().iterations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_runs_out_before_target() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1, 2])],
            vec![
                vec![FakeResponse::listing(&[3, 4])],
                vec![FakeResponse::listing(&[5, 6])],
                vec![FakeResponse::listing(&[7, 8])],
                vec![FakeResponse::listing(&[9, 10])],
            ],
        );

        let report = CollectionRun::new(&page, profile(), config(Some(10), 3))
            .run(pending())
            .await;

        assert_eq!(report.records.len(), 8);
        assert!(!report.complete);
        assert!(matches!(report.termination, Termination::BudgetExhausted));
        assert_eq!(page.scrolls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payload_does_not_disturb_run() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1])],
            vec![
                vec![
                    FakeResponse::new(LISTING_URL, "{\"itemList\": [ {\"id\""),
                    FakeResponse::unreadable(LISTING_URL),
                ],
                vec![FakeResponse::listing(&[2])],
            ],
        );

        let report = CollectionRun::new(&page, profile(), config(None, 2))
            .run(pending())
            .await;

        assert_eq!(ids(&report), vec!["1", "2"]);
        assert!(matches!(report.termination, Termination::BudgetExhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_page_ends_run() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1, 2])],
            vec![vec![FakeResponse::last_listing(&[3])], vec![FakeResponse::listing(&[4])]],
        );

        let report = CollectionRun::new(&page, profile(), config(Some(50), 20))
            .run(pending())
            .await;

        assert_eq!(ids(&report), vec!["1", "2", "3"]);
        assert!(matches!(report.termination, Termination::PageExhausted));
        assert_eq!(page.scrolls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_keeps_partial_records() {
        let page = FakePage::new(vec![FakeResponse::listing(&[1, 2])], vec![]).failing_navigation();

        let report = CollectionRun::new(&page, profile(), config(None, 5))
            .run(pending())
            .await;

        assert!(matches!(
            report.termination,
            Termination::Failed(CollectError::Navigation(_))
        ));
        assert_eq!(ids(&report), vec!["1", "2"]);
        assert!(report.scroll.is_none());
        assert_eq!(page.scrolls(), 0);
        assert_eq!(page.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_failure_is_fatal() {
        let page = FakePage::default().failing_registration();

        let report = CollectionRun::new(&page, profile(), config(None, 5))
            .run(pending())
            .await;

        assert!(matches!(
            report.termination,
            Termination::Failed(CollectError::Interception(_))
        ));
        assert!(report.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_scrolling() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1])],
            vec![vec![FakeResponse::listing(&[2])]; 10],
        );

        let report = CollectionRun::new(&page, profile(), config(None, 20))
            .run(sleep(Duration::from_secs(6)))
            .await;

        assert!(matches!(report.termination, Termination::Interrupted));
        assert!(page.scrolls() < 20);
        assert_eq!(ids(&report), vec!["1", "2"]);
        assert_eq!(page.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_after_target_reports_target_reached() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1])],
            vec![vec![FakeResponse::listing(&[2, 3])]],
        );

        // Target is met by the first scroll at 3s; the interrupt lands in the settle wait.
        let report = CollectionRun::new(&page, profile(), config(Some(2), 20))
            .run(sleep(Duration::from_secs(5)))
            .await;

        assert!(report.complete);
        assert!(matches!(report.termination, Termination::TargetReached));
        assert_eq!(ids(&report), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_can_be_closed_again_after_run() {
        let page = FakePage::new(vec![FakeResponse::listing(&[1])], vec![]);

        let report = CollectionRun::new(&page, profile(), config(Some(1), 5))
            .run(pending())
            .await;
        assert!(report.complete);
        assert_eq!(page.closes(), 1);

        assert!(page.close().is_ok());
        assert!(page.close().is_ok());
        assert_eq!(page.closes(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_on_multi_thread_runtime() {
        let page = FakePage::new(
            vec![FakeResponse::listing(&[1, 2])],
            vec![vec![FakeResponse::listing(&[3])]],
        );
        let config = CollectConfig {
            target: Some(3),
            budget: ScrollBudget {
                max_iterations: 3,
                pause: Duration::from_millis(10),
            },
            settle: Duration::from_millis(10),
            initial_wait: Duration::from_millis(10),
            ..CollectConfig::default()
        };

        let report = CollectionRun::new(&page, profile(), config).run(pending()).await;

        assert_eq!(ids(&report), vec!["1", "2", "3"]);
        assert!(matches!(report.termination, Termination::TargetReached));
    }

    #[test]
    fn test_blocking_outside_runtime() {
        assert_eq!(blocking(|| 7), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_observable() {
        let page = FakePage::new(vec![FakeResponse::listing(&[1, 2, 3])], vec![]);
        let run = CollectionRun::new(&page, profile(), config(Some(3), 5));
        let progress = run.progress();

        let report = run.run(pending()).await;

        let snapshot = *progress.borrow();
        assert_eq!(snapshot.collected, 3);
        assert!(snapshot.complete);
        assert_eq!(report.records.len(), 3);
    }
}
