//! Event differ: turns a batch of `user/updated` events into per-listing
//! like-count deltas.
//!
//! Each event carries the user entity after the change plus a partial
//! snapshot of its state before the change. Comparing the pre- and
//! post-event `likedListings` lists for a single event yields at most one
//! added or one removed listing id; deltas are then summed per listing
//! across the whole batch.
//!
//! Events that contribute nothing are not dropped silently: every exclusion
//! carries an [`IgnoreReason`], so "no change" and "malformed input" stay
//! distinguishable in tests and metrics.

use std::collections::BTreeMap;

use crate::event::{Event, LikedListings, liked_listings};
use crate::listing::ListingId;

/// Net like-count deltas for one poll cycle, keyed by listing id.
pub type LikeAggregate = BTreeMap<ListingId, i64>;

/// Outcome of classifying a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event toggled exactly one listing's membership.
    Change { listing_id: ListingId, delta: i64 },
    /// The event contributes nothing to the aggregate.
    Ignored(IgnoreReason),
}

/// Why an event was excluded from aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// `previousValues` does not carry the `likedListings` path: the update
    /// did not target liked listings at all.
    NoPreviousLikedListings,
    /// A `likedListings` payload was present but not a list of UUID strings.
    Malformed,
    /// Previous and current sets are identical.
    NoChange,
    /// The set difference contains more than one listing id. Which of them
    /// is "the" toggled listing is undefined, so the event is flagged and
    /// skipped instead of guessed at.
    AmbiguousDiff,
}

impl IgnoreReason {
    /// Stable label for metrics and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::NoPreviousLikedListings => "no_previous_liked_listings",
            Self::Malformed => "malformed",
            Self::NoChange => "no_change",
            Self::AmbiguousDiff => "ambiguous_diff",
        }
    }
}

/// Per-batch classification counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Events that produced a delta.
    pub changes: usize,
    /// Events whose `previousValues` lack the `likedListings` path.
    pub no_previous: usize,
    /// Events with a malformed `likedListings` payload.
    pub malformed: usize,
    /// Events whose previous and current sets are identical.
    pub no_change: usize,
    /// Events whose set difference held more than one listing id.
    pub ambiguous: usize,
}

impl DiffStats {
    /// Total excluded events, across all reasons.
    pub fn ignored(&self) -> usize {
        self.no_previous + self.malformed + self.no_change + self.ambiguous
    }

    fn record_ignored(&mut self, reason: IgnoreReason) {
        match reason {
            IgnoreReason::NoPreviousLikedListings => self.no_previous += 1,
            IgnoreReason::Malformed => self.malformed += 1,
            IgnoreReason::NoChange => self.no_change += 1,
            IgnoreReason::AmbiguousDiff => self.ambiguous += 1,
        }
    }
}

/// Classify a single event as a like-count change or a tagged exclusion.
///
/// The event is only relevant when its `previousValues` carry the
/// `likedListings` path at all: an absent path means the update did not
/// touch liked listings. An explicit `null` is different — it means the
/// user had no likes before, so the entire current set is newly added.
pub fn classify_event(event: &Event) -> EventOutcome {
    let previous = match liked_listings(&event.previous_values) {
        LikedListings::Ids(ids) => Some(ids),
        LikedListings::Null => None,
        LikedListings::Absent => {
            return EventOutcome::Ignored(IgnoreReason::NoPreviousLikedListings);
        }
        LikedListings::Malformed => return EventOutcome::Ignored(IgnoreReason::Malformed),
    };

    let current = match liked_listings(&event.resource) {
        LikedListings::Ids(ids) => Some(ids),
        LikedListings::Null | LikedListings::Absent => None,
        LikedListings::Malformed => return EventOutcome::Ignored(IgnoreReason::Malformed),
    };

    single_toggle(previous.as_deref(), current.as_deref())
}

/// Resolve a pre/post liked-listings pair into a single toggled listing.
///
/// A longer current list means an addition (+1) over `current − previous`;
/// otherwise a removal (−1) over `previous − current`. An absent/null side
/// makes the entire other list the target set.
fn single_toggle(
    previous: Option<&[ListingId]>,
    current: Option<&[ListingId]>,
) -> EventOutcome {
    let (delta, targets) = match (previous, current) {
        (None, None) => return EventOutcome::Ignored(IgnoreReason::NoChange),
        (None, Some(curr)) => (1, curr.to_vec()),
        (Some(prev), None) => (-1, prev.to_vec()),
        (Some(prev), Some(curr)) => {
            if prev.len() < curr.len() {
                (1, difference(curr, prev))
            } else {
                (-1, difference(prev, curr))
            }
        }
    };

    match targets.as_slice() {
        [] => EventOutcome::Ignored(IgnoreReason::NoChange),
        [listing_id] => EventOutcome::Change {
            listing_id: *listing_id,
            delta,
        },
        _ => EventOutcome::Ignored(IgnoreReason::AmbiguousDiff),
    }
}

/// Elements of `a` not present in `b`, in `a`'s order.
fn difference(a: &[ListingId], b: &[ListingId]) -> Vec<ListingId> {
    a.iter().filter(|id| !b.contains(id)).copied().collect()
}

/// Classify every event in a batch and sum the resulting deltas per listing.
///
/// Multiple events touching the same listing within one batch are summed,
/// never applied independently. Ambiguous diffs are logged at `warn` and
/// counted, but never applied.
pub fn aggregate_events(events: &[Event]) -> (LikeAggregate, DiffStats) {
    let mut aggregate = LikeAggregate::new();
    let mut stats = DiffStats::default();

    for event in events {
        match classify_event(event) {
            EventOutcome::Change { listing_id, delta } => {
                stats.changes += 1;
                *aggregate.entry(listing_id).or_insert(0) += delta;
            }
            EventOutcome::Ignored(reason) => {
                stats.record_ignored(reason);
                match reason {
                    IgnoreReason::AmbiguousDiff => tracing::warn!(
                        sequence_id = event.sequence_id,
                        "liked-listings diff holds more than one listing id, skipping event"
                    ),
                    IgnoreReason::Malformed => tracing::debug!(
                        sequence_id = event.sequence_id,
                        "malformed likedListings payload, skipping event"
                    ),
                    _ => {}
                }
            }
        }
    }

    (aggregate, stats)
}
