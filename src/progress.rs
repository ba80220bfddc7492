use collector::Progress;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct CollectProgress {
    bar: Option<ProgressBar>,
    finished: Cell<bool>,
}

impl CollectProgress {
    pub fn new(target: Option<usize>, enabled: bool) -> Self {
        let bar = if enabled {
            let pb = match target {
                Some(target) => {
                    let pb = ProgressBar::new(target as u64);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} videos {msg}")
                            .expect("Invalid progress bar template")
                            .progress_chars("#>-"),
                    );
                    pb
                }
                None => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} [{elapsed_precise}] {pos} videos {msg}")
                            .expect("Invalid progress bar template"),
                    );
                    pb
                }
            };
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        Self {
            bar,
            finished: Cell::new(false),
        }
    }

    /// Mirrors collection progress onto the bar until the channel closes.
    pub fn track(&self, mut progress: watch::Receiver<Progress>) -> JoinHandle<()> {
        let bar = self.bar.clone();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let snapshot = *progress.borrow_and_update();
                if let Some(ref pb) = bar {
                    pb.set_position(snapshot.collected as u64);
                    if snapshot.exhausted {
                        pb.set_message("(end of profile)");
                    }
                }
            }
        })
    }

    pub fn finish(&self, collected: usize, message: &str) {
        if self.finished.replace(true) {
            return;
        }

        if let Some(ref pb) = self.bar {
            pb.set_position(collected as u64);
            pb.finish_with_message(format!("✓ {}", message));
        }
    }
}

impl Drop for CollectProgress {
    fn drop(&mut self) {
        // Only auto-clear the progress bar if we haven't explicitly finished it.
        if !self.finished.get() {
            if let Some(ref pb) = self.bar {
                pb.finish_and_clear();
            }
        }
    }
}
