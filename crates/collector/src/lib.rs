//! Incremental collection of video metadata from a profile page.
//!
//! The page is scrolled to provoke its listing requests, the responses are
//! intercepted and decoded, and the unique records are accumulated until a
//! target count is reached or the page runs out of data.

pub mod accumulator;
pub mod error;
pub mod interceptor;
pub mod payload;
pub mod profile;
pub mod run;
pub mod scroll;

#[cfg(test)]
pub(crate) mod testing;

pub use accumulator::{Accumulator, CollectionState, IngestSummary, Progress, VideoRecord};
pub use error::{CollectError, PayloadError};
pub use interceptor::{ResponseInterceptor, DEFAULT_ENDPOINT_PATTERN};
pub use payload::{ItemListPage, VideoEntry};
pub use profile::Profile;
pub use run::{CollectConfig, CollectionReport, CollectionRun, Termination};
pub use scroll::{ScrollBudget, ScrollDriver, ScrollOutcome, StopReason};
