//! Caller-facing entry point for discovery operations.
//!
//! This module provides the `ScanOrchestrator`, which admits at most one
//! session at a time, applies a cooldown between operations, runs the
//! session and hands its outcome to a [`ScanDelegate`].

use crate::error::{display_secs, retry_after_secs, ScanError};
use crate::fetcher::PageFetcher;
use crate::progress::ProgressSink;
use crate::rate_limiter::RateLimiter;
use crate::session::{ScanKind, ScanOutcome, ScanSession};
use crate::transport::{ListingTransport, ReqwestTransport};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracked_core::{AppConfig, PlaceId, ScoredServerInstance};
use uuid::Uuid;

/// Informational and error messages for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The scan finished without a qualifying instance
    NoServerFound {
        /// Strategy that ran
        kind: ScanKind,
    },
    /// The upstream is throttling requests
    RateLimited {
        /// Time until requests are allowed again
        retry_after: Duration,
    },
    /// The scan failed
    Error {
        /// Human-readable cause
        message: String,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::NoServerFound { kind } => {
                write!(f, "No suitable server found ({kind} scan)")
            }
            Notification::RateLimited { retry_after } => write!(
                f,
                "Too many requests, try again in {}s",
                retry_after_secs(*retry_after)
            ),
            Notification::Error { message } => write!(f, "Scan failed: {message}"),
        }
    }
}

/// Collaborator that acts on scan outcomes.
///
/// Implementations must be thread-safe (Send + Sync) for use in async contexts.
#[async_trait]
pub trait ScanDelegate: Send + Sync {
    /// Join a single chosen instance.
    async fn join_instance(&self, place_id: &PlaceId, instance: &ScoredServerInstance);

    /// Show a ranked list for the user to pick from.
    async fn present_candidates(
        &self,
        place_id: &PlaceId,
        kind: ScanKind,
        candidates: &[ScoredServerInstance],
    );

    /// Show a message.
    async fn notify(&self, notification: Notification);
}

/// A request that was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Another session holds the slot
    #[error("a {active} scan is already running")]
    Busy {
        /// Kind of the running session
        active: ScanKind,
    },

    /// The previous operation finished too recently
    #[error("cooling down, try again in {}s", display_secs(.remaining))]
    CoolingDown {
        /// Time until a new operation is admitted
        remaining: Duration,
    },
}

struct ActiveSession {
    id: Uuid,
    kind: ScanKind,
    cancel: CancellationToken,
    stop: CancellationToken,
}

#[derive(Default)]
struct GuardState {
    active: Option<ActiveSession>,
    cooldown_until: Option<Instant>,
}

impl GuardState {
    fn cooldown_remaining(&self) -> Duration {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }
}

/// Holds the single active-session slot; releasing it starts the cooldown.
struct SessionLease {
    guard: Arc<Mutex<GuardState>>,
    cooldown: Option<Duration>,
}

impl SessionLease {
    /// Make the post-operation cooldown at least `duration`.
    fn extend_cooldown(&mut self, duration: Duration) {
        self.cooldown = self.cooldown.map(|current| current.max(duration));
    }

    /// Release without starting a cooldown.
    fn skip_cooldown(&mut self) {
        self.cooldown = None;
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let mut state = lock(&self.guard);
        if let Some(active) = state.active.take() {
            tracing::debug!("Released session {}", active.id);
        }
        if let Some(cooldown) = self.cooldown {
            state.cooldown_until = Some(Instant::now() + cooldown);
        }
    }
}

fn lock(guard: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    guard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single-flight coordinator for discovery operations.
pub struct ScanOrchestrator {
    /// Shared configuration
    config: Arc<AppConfig>,
    /// Fetch primitive shared by every session
    fetcher: Arc<PageFetcher>,
    /// Limiter checked before any session starts
    rate_limiter: Arc<RateLimiter>,
    /// Receives outcomes
    delegate: Arc<dyn ScanDelegate>,
    /// Active-session slot and cooldown
    guard: Arc<Mutex<GuardState>>,
}

impl ScanOrchestrator {
    /// Create an orchestrator using HTTP and the process-wide rate limiter.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: AppConfig, delegate: Arc<dyn ScanDelegate>) -> crate::error::Result<Self> {
        let transport = ReqwestTransport::new(&config.api, config.fetch.request_timeout())?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            RateLimiter::shared(),
            delegate,
        ))
    }

    /// Create an orchestrator over an explicit transport and limiter.
    #[must_use]
    pub fn with_transport(
        config: AppConfig,
        transport: Arc<dyn ListingTransport>,
        rate_limiter: Arc<RateLimiter>,
        delegate: Arc<dyn ScanDelegate>,
    ) -> Self {
        let fetcher = Arc::new(PageFetcher::new(transport, rate_limiter.clone(), &config.fetch));
        Self {
            config: Arc::new(config),
            fetcher,
            rate_limiter,
            delegate,
            guard: Arc::new(Mutex::new(GuardState::default())),
        }
    }

    /// Run one discovery operation and deliver its outcome.
    ///
    /// Rejected immediately, without queueing, while another session is
    /// active or the cooldown after the previous one has not elapsed.
    /// Invalid input and an active rate limit are reported through the
    /// delegate without starting a session.
    pub async fn run(
        &self,
        kind: ScanKind,
        place_id: &str,
        progress: ProgressSink,
    ) -> Result<ScanOutcome, Rejection> {
        let cancel = CancellationToken::new();
        let stop = cancel.child_token();
        let mut lease = self.acquire(kind, &cancel, &stop)?;

        let place_id = match PlaceId::new(place_id) {
            Ok(place_id) => place_id,
            Err(err) => {
                lease.skip_cooldown();
                let outcome = ScanOutcome::from_error(ScanError::from(err));
                self.deliver(None, &outcome).await;
                return Ok(outcome);
            }
        };

        if let Err(err) = self.rate_limiter.check() {
            lease.skip_cooldown();
            let outcome = ScanOutcome::from_error(err);
            self.deliver(Some(&place_id), &outcome).await;
            return Ok(outcome);
        }

        let mut session = ScanSession::new(
            kind,
            place_id.clone(),
            self.fetcher.clone(),
            self.config.clone(),
            progress,
            cancel,
            stop,
        );
        self.register(&session);

        let outcome = session.run().await;
        if let ScanOutcome::RateLimited { retry_after } = &outcome {
            lease.extend_cooldown(*retry_after);
        }

        self.deliver(Some(&place_id), &outcome).await;
        Ok(outcome)
    }

    /// Cancel the active session, whatever its kind.
    pub fn cancel(&self) -> bool {
        let state = lock(&self.guard);
        match &state.active {
            Some(active) => {
                tracing::info!("Cancelling {} scan", active.kind);
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Abandon the active hunt; does nothing for other kinds.
    pub fn stop_hunt(&self) -> bool {
        let state = lock(&self.guard);
        match &state.active {
            Some(active) if active.kind == ScanKind::Hunt => {
                tracing::info!("Stopping hunt");
                active.stop.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether a session currently holds the slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        lock(&self.guard).active.is_some()
    }

    /// Kind of the running session, if any.
    #[must_use]
    pub fn active_kind(&self) -> Option<ScanKind> {
        lock(&self.guard).active.as_ref().map(|active| active.kind)
    }

    /// Time left before a new operation is admitted.
    #[must_use]
    pub fn cooldown_remaining(&self) -> Duration {
        lock(&self.guard).cooldown_remaining()
    }

    /// The limiter this orchestrator checks.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn acquire(
        &self,
        kind: ScanKind,
        cancel: &CancellationToken,
        stop: &CancellationToken,
    ) -> Result<SessionLease, Rejection> {
        let mut state = lock(&self.guard);

        if let Some(active) = &state.active {
            tracing::debug!("Rejected {} scan: {} scan running", kind, active.kind);
            return Err(Rejection::Busy {
                active: active.kind,
            });
        }

        let remaining = state.cooldown_remaining();
        if !remaining.is_zero() {
            tracing::debug!("Rejected {} scan: cooling down for {:?}", kind, remaining);
            return Err(Rejection::CoolingDown { remaining });
        }

        state.active = Some(ActiveSession {
            id: Uuid::nil(),
            kind,
            cancel: cancel.clone(),
            stop: stop.clone(),
        });

        Ok(SessionLease {
            guard: self.guard.clone(),
            cooldown: Some(Duration::from_millis(self.config.orchestrator.cooldown_ms)),
        })
    }

    fn register(&self, session: &ScanSession) {
        let mut state = lock(&self.guard);
        if let Some(active) = state.active.as_mut() {
            active.id = session.id();
        }
    }

    async fn deliver(&self, place_id: Option<&PlaceId>, outcome: &ScanOutcome) {
        match outcome {
            ScanOutcome::Found { kind, servers } => {
                let Some(place_id) = place_id else { return };
                match (kind, servers.as_slice()) {
                    (ScanKind::Deep | ScanKind::NewServers, [_, _, ..]) => {
                        self.delegate.present_candidates(place_id, *kind, servers).await;
                    }
                    (_, [best, ..]) => {
                        tracing::info!(
                            "Joining {} ({} playing, score {})",
                            best.id(),
                            best.instance.playing,
                            best.score
                        );
                        self.delegate.join_instance(place_id, best).await;
                    }
                    (_, []) => {}
                }
            }
            ScanOutcome::Exhausted { kind } => {
                self.delegate
                    .notify(Notification::NoServerFound { kind: *kind })
                    .await;
            }
            ScanOutcome::RateLimited { retry_after } => {
                self.delegate
                    .notify(Notification::RateLimited {
                        retry_after: *retry_after,
                    })
                    .await;
            }
            ScanOutcome::Failed(err) => {
                self.delegate
                    .notify(Notification::Error {
                        message: err.to_string(),
                    })
                    .await;
            }
            ScanOutcome::Cancelled => {
                tracing::debug!("Scan cancelled, nothing to deliver");
            }
        }
    }
}
