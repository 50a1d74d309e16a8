//! Cursor-driven walk over the listing for the bounded scan variants.

use crate::cursor::Cursor;
use crate::error::{Result, ScanError};
use crate::fetcher::{pause, FetchPolicy, PageFetcher};
use crate::filter::InstanceFilter;
use crate::progress::{ProgressSink, ScanProgress};
use crate::url_builder::build_listing_url;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracked_core::{AppConfig, PlaceId, ServerInstance, SortOrder};

/// What a paginated scan collects and when it stops.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    /// Listing order to request
    pub sort_order: SortOrder,
    /// Result cap
    pub max_results: usize,
    /// Page cap, failed pages included
    pub max_pages: u32,
    /// Stop early once this many matches are collected
    pub sufficient_results: Option<usize>,
    /// Predicate every collected instance satisfies
    pub filter: InstanceFilter,
}

impl ScanPlan {
    /// Oldest instances first, at least `min_players` playing.
    #[must_use]
    pub fn normal(config: &AppConfig) -> Self {
        Self {
            sort_order: SortOrder::Asc,
            max_results: config.scan.max_results,
            max_pages: config.scan.max_pages,
            sufficient_results: None,
            filter: InstanceFilter::MinPlayers(config.scan.min_players),
        }
    }

    /// Normal scan with the deep-scan result cap.
    #[must_use]
    pub fn deep(config: &AppConfig) -> Self {
        Self {
            max_results: config.scan.deep_scan_limit,
            ..Self::normal(config)
        }
    }

    /// Newest instances first, sparsely populated and not laggy.
    #[must_use]
    pub fn new_servers(config: &AppConfig) -> Self {
        let new_server = &config.new_server;
        Self {
            sort_order: SortOrder::Desc,
            max_results: new_server.max_scan,
            max_pages: new_server.max_pages,
            sufficient_results: Some(new_server.sufficient_results),
            filter: InstanceFilter::Fresh {
                max_fullness_percent: new_server.max_fullness_percent,
                max_ping_ms: new_server.max_ping_ms,
            },
        }
    }
}

/// Drives the fetcher across cursor-linked pages.
pub struct Paginator {
    fetcher: Arc<PageFetcher>,
    config: Arc<AppConfig>,
}

impl Paginator {
    /// Create a paginator over a shared fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<PageFetcher>, config: Arc<AppConfig>) -> Self {
        Self { fetcher, config }
    }

    /// Collect up to `plan.max_results` matching instances.
    ///
    /// Stops on an empty page, an exhausted cursor, the page cap, or
    /// `max_consecutive_errors` failed pages in a row. Rate limiting,
    /// cancellation, 403 and 404 end the scan immediately. When the error
    /// threshold is reached with nothing collected the last error is
    /// returned; otherwise the partial result is.
    pub async fn run(
        &self,
        place_id: &PlaceId,
        plan: &ScanPlan,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServerInstance>> {
        let scan = &self.config.scan;
        let policy = FetchPolicy::from_config(&self.config.fetch);
        let error_pause = Duration::from_millis(scan.error_pause_ms);
        let malformed_pause = Duration::from_millis(scan.malformed_pause_ms);

        let mut results: Vec<ServerInstance> = Vec::new();
        let mut cursor: Option<Cursor> = None;
        let mut consecutive_errors: u32 = 0;
        let mut last_error: Option<ScanError> = None;
        let mut page: u32 = 0;

        while results.len() < plan.max_results
            && consecutive_errors < scan.max_consecutive_errors
            && page < plan.max_pages
        {
            page += 1;
            let url = build_listing_url(
                &self.config.api.base_url,
                place_id,
                plan.sort_order,
                self.config.api.page_size,
                cursor.as_ref(),
            );

            let listing = match self.fetcher.fetch(&url, &policy, cancel).await {
                Ok(listing) => listing,
                Err(err) if err.halts_scan() => return Err(err),
                Err(err) => {
                    consecutive_errors += 1;
                    tracing::warn!(
                        "Page {} failed ({}/{}): {}",
                        page,
                        consecutive_errors,
                        scan.max_consecutive_errors,
                        err
                    );
                    last_error = Some(err);
                    if consecutive_errors < scan.max_consecutive_errors {
                        pause(error_pause, cancel).await?;
                    }
                    continue;
                }
            };

            let Some(entries) = listing.entries() else {
                consecutive_errors += 1;
                tracing::warn!(
                    "Page {} has no data array ({}/{})",
                    page,
                    consecutive_errors,
                    scan.max_consecutive_errors
                );
                last_error = Some(ScanError::MalformedResponse(
                    "listing page has no data array".to_string(),
                ));
                if consecutive_errors < scan.max_consecutive_errors {
                    pause(malformed_pause, cancel).await?;
                }
                continue;
            };

            if entries.is_empty() {
                tracing::debug!("Page {} is empty, listing exhausted", page);
                break;
            }

            let matched: Vec<ServerInstance> = listing
                .instances()
                .into_iter()
                .filter(|server| plan.filter.matches(server))
                .collect();
            let matched_count = matched.len();
            results.extend(matched);
            consecutive_errors = 0;

            progress.emit(ScanProgress::Page {
                scanned: results.len().min(plan.max_results),
                target: plan.max_results,
                page,
            });
            tracing::debug!(
                "Page {}: {} of {} entries matched, {} total",
                page,
                matched_count,
                entries.len(),
                results.len()
            );

            if plan
                .sufficient_results
                .is_some_and(|sufficient| results.len() >= sufficient)
            {
                tracing::debug!("Collected {} instances, stopping early", results.len());
                break;
            }

            match listing.next_cursor() {
                Some(next) => cursor = Some(next),
                None => {
                    tracing::debug!("No further cursor after page {}", page);
                    break;
                }
            }
        }

        if results.is_empty() && consecutive_errors >= scan.max_consecutive_errors {
            if let Some(err) = last_error {
                return Err(err);
            }
        }

        results.truncate(plan.max_results);
        Ok(results)
    }
}
