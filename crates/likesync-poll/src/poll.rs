//! The poll loop: fetch → diff → apply → persist cursor → reschedule.
//!
//! Cycles are strictly non-overlapping: cycle N+1's fetch starts only after
//! cycle N's listing updates and cursor write have settled, so the cursor
//! never advances ahead of unapplied updates. Within one cycle the
//! per-listing read-modify-write updates run concurrently; they target
//! independent listings and are bounded by the command-channel rate limiter.
//!
//! The loop has two logical states: NO_CURSOR (poll from the process start
//! time) and RESUMING (poll strictly after the stored sequence id). The
//! transition happens on the first batch holding at least one event.
//!
//! A cycle that fails — remote call, cursor write — propagates out of
//! [`Poller::run`]; restarting is the supervisor's job. Under a crash after
//! updates were applied but before the cursor write, the batch is
//! re-delivered and re-applied on the next start: at-least-once, not
//! exactly-once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use likesync_core::{DiffStats, IgnoreReason, ListingId, aggregate_events};
use metrics::{counter, gauge, histogram};
use serde_json::json;

use crate::client::{EventQuery, MarketplaceApi};
use crate::cursor::CursorStore;
use crate::error::Result;

/// Timing knobs for the poll loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay before the next poll when a full page was returned.
    pub poll_wait: Duration,

    /// Delay before the next poll when the stream is drained.
    pub idle_wait: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_wait: Duration::from_millis(250),
            idle_wait: Duration::from_secs(10),
        }
    }
}

/// Statistics from a single poll cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// Events returned by the event query.
    pub events_received: usize,

    /// Events that produced a like-count delta.
    pub changes: usize,

    /// Events excluded from aggregation.
    pub events_ignored: usize,

    /// Listings whose like count was updated.
    pub listings_updated: usize,

    /// Whether the server returned a full page.
    pub full_page: bool,

    /// Delay chosen before the next cycle.
    pub next_delay: Duration,

    /// Wall-clock duration of the cycle.
    pub duration: Duration,
}

/// The event poll loop.
pub struct Poller<A> {
    api: A,
    cursor_store: CursorStore,
    config: PollerConfig,

    /// Lower bound for the first query when no cursor is stored.
    start_time: DateTime<Utc>,

    /// Last processed sequence id; `None` until the first non-empty batch.
    cursor: Option<u64>,

    running: Arc<AtomicBool>,
}

impl<A: MarketplaceApi> Poller<A> {
    /// Create a poller, restoring any persisted cursor.
    pub fn new(
        api: A,
        cursor_store: CursorStore,
        config: PollerConfig,
        start_time: DateTime<Utc>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let cursor = cursor_store.load();
        Self {
            api,
            cursor_store,
            config,
            start_time,
            cursor,
            running,
        }
    }

    /// The current cursor position.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Run poll cycles until the running flag is cleared.
    ///
    /// The loop has no internal termination condition; it stops between
    /// cycles when the flag drops, or propagates the first failed cycle.
    pub async fn run(&mut self) -> Result<()> {
        match self.cursor {
            Some(sequence_id) => tracing::info!(
                "resuming event polling from last seen event with sequence ID {sequence_id}"
            ),
            None => tracing::info!("no stored state, starting event polling from current time"),
        }

        while self.running.load(Ordering::SeqCst) {
            let stats = self.run_once().await?;

            tracing::debug!(
                events = stats.events_received,
                updated = stats.listings_updated,
                ignored = stats.events_ignored,
                full_page = stats.full_page,
                "poll cycle complete"
            );

            self.wait(stats.next_delay).await;
        }

        tracing::info!("poll loop stopped");
        Ok(())
    }

    /// Execute one poll cycle: fetch, diff, apply, persist.
    pub async fn run_once(&mut self) -> Result<CycleStats> {
        let started = Instant::now();

        let query = match self.cursor {
            Some(sequence_id) => EventQuery::StartAfterSequenceId(sequence_id),
            None => EventQuery::CreatedAtStart(self.start_time),
        };

        let page = self.api.query_events(query).await?;
        let (aggregate, diff_stats) = aggregate_events(&page.events);

        // Per-listing updates target independent listings and run
        // concurrently; the cycle only continues once all of them settled.
        // A net-zero entry would be a wasted remote write and is skipped.
        let updates: Vec<_> = aggregate
            .iter()
            .filter(|(listing_id, delta)| {
                if **delta == 0 {
                    tracing::debug!(listing_id = %listing_id, "net-zero delta, skipping update");
                }
                **delta != 0
            })
            .map(|(listing_id, delta)| self.apply_delta(*listing_id, *delta))
            .collect();
        let listings_updated = futures::future::try_join_all(updates).await?.len();

        // The cursor only advances after every update above succeeded; a
        // crash between the two re-delivers this batch on restart.
        if let Some(sequence_id) = page.last_sequence_id() {
            self.cursor_store.save(sequence_id)?;
            self.cursor = Some(sequence_id);
            gauge!("poll_cursor_sequence_id").set(sequence_id as f64);
        }

        record_cycle_metrics(page.events.len(), &diff_stats, listings_updated, started);

        let full_page = page.is_full();
        Ok(CycleStats {
            events_received: page.events.len(),
            changes: diff_stats.changes,
            events_ignored: diff_stats.ignored(),
            listings_updated,
            full_page,
            next_delay: if full_page {
                self.config.poll_wait
            } else {
                self.config.idle_wait
            },
            duration: started.elapsed(),
        })
    }

    /// Read-modify-write one listing's like count.
    ///
    /// Not atomic against concurrent writers of the same listing; an
    /// overlapping poller or a direct public-data edit can lose an update.
    async fn apply_delta(&self, listing_id: ListingId, delta: i64) -> Result<i64> {
        let listing = self.api.query_listing(&listing_id).await?;
        let likes = listing.likes() + delta;

        let updated = self
            .api
            .update_listing(&listing_id, json!({ "likes": likes }))
            .await?;

        tracing::info!(
            "listing ID {} updated. It has now {} likes",
            updated.id,
            updated.likes()
        );
        Ok(updated.likes())
    }

    /// Sleep `delay` in short slices so shutdown is honored promptly.
    async fn wait(&self, delay: Duration) {
        let started = Instant::now();
        while self.running.load(Ordering::SeqCst) {
            let elapsed = started.elapsed();
            if elapsed >= delay {
                break;
            }
            let remaining = delay - elapsed;
            tokio::time::sleep(remaining.min(Duration::from_secs(1))).await;
        }
    }
}

/// Emit the per-cycle counters and histograms.
fn record_cycle_metrics(
    events_received: usize,
    diff_stats: &DiffStats,
    listings_updated: usize,
    started: Instant,
) {
    counter!("poll_cycles_total").increment(1);
    counter!("poll_events_received_total").increment(events_received as u64);
    counter!("poll_listings_updated_total").increment(listings_updated as u64);
    histogram!("poll_cycle_duration_seconds").record(started.elapsed().as_secs_f64());

    let ignored = [
        (IgnoreReason::NoPreviousLikedListings, diff_stats.no_previous),
        (IgnoreReason::Malformed, diff_stats.malformed),
        (IgnoreReason::NoChange, diff_stats.no_change),
        (IgnoreReason::AmbiguousDiff, diff_stats.ambiguous),
    ];
    for (reason, count) in ignored {
        if count > 0 {
            counter!("poll_events_ignored_total", "reason" => reason.label())
                .increment(count as u64);
        }
    }
}
