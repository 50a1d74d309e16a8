//! Tracked Scanner - Server discovery and ranking engine.
//!
//! This crate walks the public server listing of a game, classifies and
//! scores the instances it finds under several strategies, and recovers
//! from throttling without issuing unbounded requests.
//!
//! # Features
//!
//! - Shared rate limiter that fails fast while the upstream is throttling
//! - Page fetching with pacing, timeouts and exponential backoff with jitter
//! - Cursor pagination with result, page and consecutive-error caps
//! - Normal, deep, new-server, hunt and auto-blocker strategies
//! - Single-flight orchestration with a cooldown between operations
//! - Cooperative cancellation and a progress event stream
//!
//! # Example
//!
//! ```rust,ignore
//! use tracked_scanner::{ProgressSink, ScanKind, ScanOrchestrator};
//! use std::sync::Arc;
//!
//! let orchestrator = ScanOrchestrator::new(config, Arc::new(delegate))?;
//! let (progress, mut events) = ProgressSink::channel();
//!
//! let outcome = orchestrator
//!     .run(ScanKind::Normal, "920587237", progress)
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cursor;
#[allow(missing_docs)]
pub mod error;
pub mod fetcher;
#[allow(missing_docs)]
pub mod filter;
pub mod insight;
pub mod join;
pub mod orchestrator;
pub mod paginator;
pub mod poller;
pub mod progress;
pub mod rate_limiter;
pub mod scorer;
pub mod session;
pub mod transport;
#[allow(missing_docs)]
pub mod url_builder;

// Re-export commonly used types
pub use cursor::Cursor;
pub use error::{retry_after_secs, Result, ScanError};
pub use fetcher::{Backoff, FetchPolicy, ListingPage, PageFetcher};
pub use filter::{auto_blocker_verdict, hunt_candidate, BlockReason, InstanceFilter, Verdict};
pub use insight::{Badge, ServerInsight};
pub use join::JoinLink;
pub use orchestrator::{Notification, Rejection, ScanDelegate, ScanOrchestrator};
pub use paginator::{Paginator, ScanPlan};
pub use poller::{AutoBlockPolicy, DualSortPoller, HuntPolicy, PollSchedule, RoundPolicy};
pub use progress::{ProgressSink, ScanProgress};
pub use rate_limiter::{RateLimitSnapshot, RateLimiter};
pub use scorer::{freshness_score, general_score, score_freshness, score_general, top_n};
pub use session::{ScanKind, ScanOutcome, ScanSession, SessionPhase};
pub use transport::{ListingTransport, ReqwestTransport, TransportError, TransportResponse};
pub use url_builder::build_listing_url;
