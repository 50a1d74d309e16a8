//! Progress events emitted while a scan runs.

use crate::filter::BlockReason;
use std::time::Duration;
use tokio::sync::mpsc;

/// One step of progress, for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanProgress {
    /// A paginated scan accepted a page
    Page {
        /// Matching instances collected so far
        scanned: usize,
        /// Result cap of the scan
        target: usize,
        /// Pages fetched so far
        page: u32,
    },
    /// A hunt started a new polling round
    HuntRound {
        /// 1-based round number
        attempt: u32,
        /// Round cap
        max_attempts: u32,
        /// Time since the hunt started
        elapsed: Duration,
    },
    /// The auto-blocker inspected a page
    Filtering {
        /// Instances inspected so far
        scanned: usize,
        /// Instances rejected so far
        blocked: usize,
        /// Pages fetched so far
        page: u32,
    },
    /// The auto-blocker rejected an instance
    Blocked {
        /// Rejected instance, if it had an id
        server_id: Option<String>,
        /// Why it was rejected
        reason: BlockReason,
        /// Instances rejected so far
        total_blocked: usize,
    },
}

/// Optional sender half of the progress stream.
///
/// Send failures (receiver dropped) are ignored.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink(Option<mpsc::UnboundedSender<ScanProgress>>);

impl ProgressSink {
    /// Create a sink and the receiver that observes it.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(Some(tx)), rx)
    }

    /// A sink that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self(None)
    }

    /// Publish an event.
    pub fn emit(&self, event: ScanProgress) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
