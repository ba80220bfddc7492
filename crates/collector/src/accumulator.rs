use crate::payload::{ItemListPage, VideoEntry};
use crate::profile::Profile;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Metadata snapshot of one video. Never modified once collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub account: String,
    pub video_url: String,
    pub title: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
}

/// What other components get to see of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub collected: usize,
    pub target: Option<usize>,
    pub complete: bool,
    pub exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub added: usize,
    pub duplicates: usize,
    pub malformed: usize,
    /// Entries left unprocessed because the target was already reached.
    pub ignored: usize,
}

/// Records in discovery order, keyed by canonical video URL.
#[derive(Debug, Clone)]
pub struct CollectionState {
    records: IndexMap<String, VideoRecord>,
    target: Option<usize>,
    complete: bool,
}

impl CollectionState {
    pub fn new(target: Option<usize>) -> Self {
        Self {
            records: IndexMap::new(),
            target,
            complete: target == Some(0),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn contains(&self, video_url: &str) -> bool {
        self.records.contains_key(video_url)
    }

    pub fn records(&self) -> impl Iterator<Item = &VideoRecord> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<VideoRecord> {
        self.records.into_values().collect()
    }

    fn push(&mut self, record: VideoRecord) {
        debug_assert!(!self.complete);
        self.records.insert(record.video_url.clone(), record);
        if let Some(target) = self.target {
            if self.records.len() >= target {
                self.complete = true;
            }
        }
    }
}

/// Sole owner of the collection state.
pub struct Accumulator {
    profile: Profile,
    state: CollectionState,
    exhausted: bool,
    progress: watch::Sender<Progress>,
}

impl Accumulator {
    pub fn new(profile: Profile, target: Option<usize>) -> Self {
        let state = CollectionState::new(target);
        let (progress, _) = watch::channel(Progress {
            collected: 0,
            target,
            complete: state.is_complete(),
            exhausted: false,
        });
        Self {
            profile,
            state,
            exhausted: false,
            progress,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn progress(&self) -> Progress {
        Progress {
            collected: self.state.len(),
            target: self.state.target(),
            complete: self.state.is_complete(),
            exhausted: self.exhausted,
        }
    }

    pub fn ingest(&mut self, page: ItemListPage) -> IngestSummary {
        let mut summary = IngestSummary::default();

        if self.state.is_complete() {
            summary.ignored = page.len();
            debug!("Target already reached, ignoring {} entries", summary.ignored);
            return summary;
        }

        if page.has_more() == Some(false) && !self.exhausted {
            info!("Listing endpoint reports no more items");
            self.exhausted = true;
        }

        let items = page.into_items();
        let total = items.len();
        for (index, value) in items.into_iter().enumerate() {
            let entry = match VideoEntry::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping malformed item entry: {}", e);
                    summary.malformed += 1;
                    continue;
                }
            };

            let video_url = self.profile.video_url(&entry.id);
            if self.state.contains(&video_url) {
                summary.duplicates += 1;
                continue;
            }

            self.state.push(VideoRecord {
                account: self.profile.handle().to_string(),
                video_url,
                title: entry.desc,
                views: entry.play_count,
                likes: entry.digg_count,
                comments: entry.comment_count,
                shares: entry.share_count,
            });
            summary.added += 1;

            if self.state.is_complete() {
                summary.ignored = total - index - 1;
                info!(
                    "Target of {} videos reached",
                    self.state.target().unwrap_or_default()
                );
                break;
            }
        }

        debug!(
            "Ingested payload: {} added, {} duplicates, {} malformed, {} ignored; {} collected",
            summary.added,
            summary.duplicates,
            summary.malformed,
            summary.ignored,
            self.state.len()
        );
        self.progress.send_replace(self.progress());
        summary
    }

    /// Processes payloads one at a time until the target is reached, the
    /// sender side goes away, or `shutdown` fires. Payloads already queued
    /// when shutdown arrives are still ingested.
    pub async fn consume(
        mut self,
        mut payloads: mpsc::UnboundedReceiver<ItemListPage>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> CollectionState {
        while !self.state.is_complete() {
            tokio::select! {
                payload = payloads.recv() => match payload {
                    Some(page) => {
                        self.ingest(page);
                    }
                    None => break,
                },
                _ = &mut shutdown => {
                    while let Ok(page) = payloads.try_recv() {
                        if self.state.is_complete() {
                            break;
                        }
                        self.ingest(page);
                    }
                    break;
                }
            }
        }
        payloads.close();
        self.state
    }
}
