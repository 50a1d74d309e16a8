//! One discovery operation, from start to a single outcome.

use crate::error::ScanError;
use crate::fetcher::PageFetcher;
use crate::paginator::{Paginator, ScanPlan};
use crate::poller::DualSortPoller;
use crate::progress::ProgressSink;
use crate::scorer::{score_freshness, score_general, top_n};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracked_core::{AppConfig, PlaceId, ScoredServerInstance, ServerInstance};
use uuid::Uuid;

/// The discovery strategies a session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    /// Oldest populated instances, best one joined
    Normal,
    /// Normal scan with a larger cap, ranked list presented
    Deep,
    /// Freshly opened, sparsely populated instances
    NewServers,
    /// Poll both listings until a near-empty instance appears
    Hunt,
    /// First instance passing hard population and ping limits
    AutoBlocker,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanKind::Normal => "normal",
            ScanKind::Deep => "deep",
            ScanKind::NewServers => "new-server",
            ScanKind::Hunt => "hunt",
            ScanKind::AutoBlocker => "auto-blocker",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Created, not yet running
    Idle,
    /// Fetching and filtering
    Scanning,
    /// At least one candidate
    Found,
    /// Caps reached with nothing qualifying
    Exhausted,
    /// Throttled by the upstream
    RateLimited,
    /// Failed
    Error,
    /// Cancelled or stopped
    Cancelled,
}

/// How a session ended.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Ranked candidates, best first; never empty
    Found {
        /// Strategy that produced them
        kind: ScanKind,
        /// Ranked candidates
        servers: Vec<ScoredServerInstance>,
    },
    /// Nothing qualified within the caps
    Exhausted {
        /// Strategy that ran
        kind: ScanKind,
    },
    /// The upstream throttled us; nothing should be sent before `retry_after`
    RateLimited {
        /// Remaining cooldown
        retry_after: Duration,
    },
    /// Any other failure
    Failed(ScanError),
    /// Cancelled or stopped by the caller
    Cancelled,
}

impl ScanOutcome {
    /// Map a terminal error to its outcome.
    #[must_use]
    pub fn from_error(err: ScanError) -> Self {
        match err {
            ScanError::RateLimited { retry_after } => ScanOutcome::RateLimited { retry_after },
            ScanError::Cancelled => ScanOutcome::Cancelled,
            other => ScanOutcome::Failed(other),
        }
    }

    /// The terminal phase this outcome corresponds to.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self {
            ScanOutcome::Found { .. } => SessionPhase::Found,
            ScanOutcome::Exhausted { .. } => SessionPhase::Exhausted,
            ScanOutcome::RateLimited { .. } => SessionPhase::RateLimited,
            ScanOutcome::Failed(_) => SessionPhase::Error,
            ScanOutcome::Cancelled => SessionPhase::Cancelled,
        }
    }

    /// The best candidate, if any.
    #[must_use]
    pub fn best(&self) -> Option<&ScoredServerInstance> {
        match self {
            ScanOutcome::Found { servers, .. } => servers.first(),
            _ => None,
        }
    }
}

/// State of a single discovery operation.
pub struct ScanSession {
    id: Uuid,
    kind: ScanKind,
    place_id: PlaceId,
    phase: SessionPhase,
    cancel: CancellationToken,
    stop: CancellationToken,
    fetcher: Arc<PageFetcher>,
    config: Arc<AppConfig>,
    progress: ProgressSink,
}

impl ScanSession {
    /// Create an idle session.
    ///
    /// `stop` should be a child of `cancel` so that cancelling the session
    /// also stops a hunt.
    #[must_use]
    pub fn new(
        kind: ScanKind,
        place_id: PlaceId,
        fetcher: Arc<PageFetcher>,
        config: Arc<AppConfig>,
        progress: ProgressSink,
        cancel: CancellationToken,
        stop: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            place_id,
            phase: SessionPhase::Idle,
            cancel,
            stop,
            fetcher,
            config,
            progress,
        }
    }

    /// Unique id, used in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Strategy this session runs.
    #[must_use]
    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Token that aborts the session.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Token that abandons a hunt.
    #[must_use]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run to completion and record the terminal phase.
    pub async fn run(&mut self) -> ScanOutcome {
        self.phase = SessionPhase::Scanning;
        tracing::info!(
            "Session {} started: {} scan for place {}",
            self.id,
            self.kind,
            self.place_id
        );

        let outcome = match self.execute().await {
            _ if self.is_aborted() => ScanOutcome::Cancelled,
            Ok(servers) if servers.is_empty() => ScanOutcome::Exhausted { kind: self.kind },
            Ok(servers) => ScanOutcome::Found {
                kind: self.kind,
                servers,
            },
            Err(err) => ScanOutcome::from_error(err),
        };

        self.phase = outcome.phase();
        match &outcome {
            ScanOutcome::Failed(err) => {
                tracing::error!("Session {} failed: {}", self.id, err);
            }
            _ => tracing::info!("Session {} finished: {:?}", self.id, self.phase),
        }
        outcome
    }

    fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled() || (self.kind == ScanKind::Hunt && self.stop.is_cancelled())
    }

    async fn execute(&self) -> crate::error::Result<Vec<ScoredServerInstance>> {
        let weights = &self.config.scoring;

        match self.kind {
            ScanKind::Normal => {
                let servers = self.paginate(&ScanPlan::normal(&self.config)).await?;
                Ok(score_general(&servers, &weights.general))
            }
            ScanKind::Deep => {
                let servers = self.paginate(&ScanPlan::deep(&self.config)).await?;
                Ok(top_n(
                    score_general(&servers, &weights.general),
                    self.config.scan.max_scored_servers,
                ))
            }
            ScanKind::NewServers => {
                let servers = self.paginate(&ScanPlan::new_servers(&self.config)).await?;
                Ok(score_freshness(&servers, &weights.freshness))
            }
            ScanKind::Hunt => {
                let found = self
                    .poller()
                    .hunt(&self.place_id, &self.config.hunt, &self.progress, &self.stop)
                    .await?;
                Ok(self.forced(found))
            }
            ScanKind::AutoBlocker => {
                let found = self
                    .poller()
                    .auto_block(
                        &self.place_id,
                        &self.config.auto_blocker,
                        &self.progress,
                        &self.cancel,
                    )
                    .await?;
                Ok(self.forced(found))
            }
        }
    }

    async fn paginate(&self, plan: &ScanPlan) -> crate::error::Result<Vec<ServerInstance>> {
        Paginator::new(self.fetcher.clone(), self.config.clone())
            .run(&self.place_id, plan, &self.progress, &self.cancel)
            .await
    }

    fn poller(&self) -> DualSortPoller {
        DualSortPoller::new(self.fetcher.clone(), &self.config.api)
    }

    fn forced(&self, found: Option<ServerInstance>) -> Vec<ScoredServerInstance> {
        score_general(found.as_slice(), &self.config.scoring.general)
            .into_iter()
            .map(|entry| ScoredServerInstance {
                is_forced: true,
                ..entry
            })
            .collect()
    }
}
