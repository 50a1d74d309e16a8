//! Round-based polling over both listing orders.
//!
//! The hunt and the auto-blocker share the same loop: each round requests
//! one page per sort order, strictly one request at a time, and hands the
//! page to a [`RoundPolicy`] that decides whether an instance was found.
//! They differ in order, spacing, cursor handling and accept policy.

use crate::cursor::Cursor;
use crate::error::Result;
use crate::fetcher::{decode_instance, pause, FetchPolicy, PageFetcher};
use crate::filter::{auto_blocker_verdict, hunt_candidate, BlockReason, Verdict};
use crate::progress::{ProgressSink, ScanProgress};
use crate::url_builder::build_listing_url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracked_core::{ApiConfig, AutoBlockerConfig, HuntConfig, PlaceId, ServerInstance, SortOrder};

/// Timing and ordering of a polling search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Sort orders requested each round, in order
    pub orders: [SortOrder; 2],
    /// Round cap
    pub max_rounds: u32,
    /// Follow each order's cursor across rounds instead of re-reading page one
    pub carry_cursors: bool,
    /// Wait before the first request
    pub startup_delay: Duration,
    /// Wait after every request
    pub request_gap: Duration,
    /// Wait between rounds
    pub round_gap: Duration,
    /// Deadline for one request
    pub timeout: Duration,
}

impl PollSchedule {
    /// Newest first, always the first page, long gaps between rounds.
    #[must_use]
    pub fn hunt(config: &HuntConfig) -> Self {
        Self {
            orders: [SortOrder::Desc, SortOrder::Asc],
            max_rounds: config.max_attempts,
            carry_cursors: false,
            startup_delay: Duration::from_millis(config.startup_delay_ms),
            request_gap: Duration::ZERO,
            round_gap: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Oldest first, walking both listings page by page.
    #[must_use]
    pub fn auto_blocker(config: &AutoBlockerConfig) -> Self {
        Self {
            orders: [SortOrder::Asc, SortOrder::Desc],
            max_rounds: config.max_rounds,
            carry_cursors: true,
            startup_delay: Duration::ZERO,
            request_gap: Duration::from_millis(config.request_delay_ms),
            round_gap: Duration::ZERO,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// Decides what a polling search accepts.
pub trait RoundPolicy: Send {
    /// Called at the start of every round (1-based).
    fn on_round(&mut self, _round: u32, _progress: &ProgressSink) {}

    /// Inspect the entries of one page; `Some` ends the search.
    fn inspect(&mut self, entries: &[Value], round: u32, progress: &ProgressSink) -> Option<ServerInstance>;
}

/// Best-effort search: lowest-population instance at or under a cap.
#[derive(Debug)]
pub struct HuntPolicy {
    max_players: u32,
    max_attempts: u32,
    started: Instant,
}

impl HuntPolicy {
    /// Start the hunt clock now.
    #[must_use]
    pub fn new(config: &HuntConfig) -> Self {
        Self {
            max_players: config.max_players,
            max_attempts: config.max_attempts,
            started: Instant::now(),
        }
    }
}

impl RoundPolicy for HuntPolicy {
    fn on_round(&mut self, round: u32, progress: &ProgressSink) {
        tracing::debug!("Hunt round {}/{}", round, self.max_attempts);
        progress.emit(ScanProgress::HuntRound {
            attempt: round,
            max_attempts: self.max_attempts,
            elapsed: self.started.elapsed(),
        });
    }

    fn inspect(&mut self, entries: &[Value], _round: u32, _progress: &ProgressSink) -> Option<ServerInstance> {
        let servers: Vec<ServerInstance> = entries.iter().filter_map(decode_instance).collect();
        hunt_candidate(&servers, self.max_players).cloned()
    }
}

/// First-match search under hard thresholds, reporting every rejection.
#[derive(Debug)]
pub struct AutoBlockPolicy {
    config: AutoBlockerConfig,
    scanned: usize,
    blocked: usize,
}

impl AutoBlockPolicy {
    /// Create a policy with zeroed counters.
    #[must_use]
    pub fn new(config: &AutoBlockerConfig) -> Self {
        Self {
            config: config.clone(),
            scanned: 0,
            blocked: 0,
        }
    }

    /// Instances inspected so far.
    #[must_use]
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Instances rejected so far.
    #[must_use]
    pub fn blocked(&self) -> usize {
        self.blocked
    }
}

impl RoundPolicy for AutoBlockPolicy {
    fn inspect(&mut self, entries: &[Value], round: u32, progress: &ProgressSink) -> Option<ServerInstance> {
        for entry in entries {
            self.scanned += 1;

            let server = decode_instance(entry);
            let verdict = server
                .as_ref()
                .map_or(Verdict::Block(BlockReason::Invalid), |s| {
                    auto_blocker_verdict(s, &self.config)
                });

            match (verdict, server) {
                (Verdict::Accept, Some(server)) => {
                    tracing::info!(
                        "Auto-blocker accepted {} ({} playing, ping {:?})",
                        server.id,
                        server.playing,
                        server.ping
                    );
                    return Some(server);
                }
                (Verdict::Block(reason), server) => {
                    self.blocked += 1;
                    progress.emit(ScanProgress::Blocked {
                        server_id: server.map(|s| s.id),
                        reason,
                        total_blocked: self.blocked,
                    });
                }
                (Verdict::Accept, None) => {}
            }
        }

        progress.emit(ScanProgress::Filtering {
            scanned: self.scanned,
            blocked: self.blocked,
            page: round,
        });
        None
    }
}

struct Lane {
    order: SortOrder,
    cursor: Option<Cursor>,
    exhausted: bool,
}

/// Alternating-order polling loop shared by the hunt and the auto-blocker.
pub struct DualSortPoller {
    fetcher: Arc<PageFetcher>,
    base_url: String,
    page_size: u32,
}

impl DualSortPoller {
    /// Create a poller over a shared fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<PageFetcher>, api: &ApiConfig) -> Self {
        Self {
            fetcher,
            base_url: api.base_url.clone(),
            page_size: api.page_size,
        }
    }

    /// Hunt for a near-empty instance until found, out of rounds or stopped.
    pub async fn hunt(
        &self,
        place_id: &PlaceId,
        config: &HuntConfig,
        progress: &ProgressSink,
        stop: &CancellationToken,
    ) -> Result<Option<ServerInstance>> {
        let mut policy = HuntPolicy::new(config);
        self.poll(place_id, &PollSchedule::hunt(config), &mut policy, progress, stop)
            .await
    }

    /// Join-filter search: first instance passing the auto-blocker thresholds.
    pub async fn auto_block(
        &self,
        place_id: &PlaceId,
        config: &AutoBlockerConfig,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Option<ServerInstance>> {
        let mut policy = AutoBlockPolicy::new(config);
        let found = self
            .poll(
                place_id,
                &PollSchedule::auto_blocker(config),
                &mut policy,
                progress,
                cancel,
            )
            .await?;

        if found.is_none() {
            tracing::info!(
                "Auto-blocker found nothing: {} scanned, {} blocked",
                policy.scanned(),
                policy.blocked()
            );
        }
        Ok(found)
    }

    /// Run `schedule` with `policy` until it accepts an instance.
    ///
    /// Transient failures skip the page. Rate limiting, cancellation,
    /// 403 and 404 end the search with an error.
    pub async fn poll<P: RoundPolicy>(
        &self,
        place_id: &PlaceId,
        schedule: &PollSchedule,
        policy: &mut P,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Option<ServerInstance>> {
        let fetch_policy = FetchPolicy::single_shot(schedule.timeout);
        let mut lanes = schedule.orders.map(|order| Lane {
            order,
            cursor: None,
            exhausted: false,
        });

        pause(schedule.startup_delay, cancel).await?;

        for round in 1..=schedule.max_rounds {
            policy.on_round(round, progress);

            for lane in &mut lanes {
                if lane.exhausted {
                    continue;
                }

                let cursor = if schedule.carry_cursors {
                    lane.cursor.as_ref()
                } else {
                    None
                };
                let url = build_listing_url(&self.base_url, place_id, lane.order, self.page_size, cursor);

                match self.fetcher.fetch(&url, &fetch_policy, cancel).await {
                    Ok(page) => {
                        if let Some(entries) = page.entries() {
                            if let Some(found) = policy.inspect(entries, round, progress) {
                                tracing::info!(
                                    "Found {} in {} listing on round {}",
                                    found.id,
                                    lane.order,
                                    round
                                );
                                return Ok(Some(found));
                            }
                            if schedule.carry_cursors {
                                match page.next_cursor() {
                                    Some(next) => lane.cursor = Some(next),
                                    None => lane.exhausted = true,
                                }
                            }
                        } else {
                            tracing::warn!("{} page on round {} has no data array", lane.order, round);
                        }
                    }
                    Err(err) if err.halts_scan() => return Err(err),
                    Err(err) => {
                        tracing::warn!("{} request on round {} failed, skipping: {}", lane.order, round, err);
                    }
                }

                pause(schedule.request_gap, cancel).await?;
            }

            if lanes.iter().all(|lane| lane.exhausted) {
                tracing::debug!("Both listings exhausted after round {}", round);
                break;
            }
            if round < schedule.max_rounds {
                pause(schedule.round_gap, cancel).await?;
            }
        }

        Ok(None)
    }
}
