//! Marketplace event model.
//!
//! Events arrive from the Integration API's event query endpoint in
//! sequence-id order. The `resource` and `previousValues` payloads are kept
//! as raw JSON: `previousValues` is a *partial* snapshot carrying only the
//! attribute subtree that changed, so a fixed struct shape would conflate
//! "field absent" with "field null" — a distinction the differ depends on.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::listing::ListingId;

/// A single event from the marketplace event stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Server-assigned position in the global event stream; strictly
    /// increasing across all events.
    pub sequence_id: u64,

    /// Event type, e.g. `user/updated`.
    pub event_type: String,

    /// Server-side creation time of the event.
    pub created_at: DateTime<Utc>,

    /// The user entity after the change.
    #[serde(default)]
    pub resource: Value,

    /// Partial snapshot of the user entity before the change.
    #[serde(default)]
    pub previous_values: Value,
}

/// One page of events returned by an event query.
#[derive(Debug, Clone)]
pub struct EventPage {
    /// Events in sequence-id order.
    pub events: Vec<Event>,

    /// Server-side page size. A page holding exactly this many events is
    /// likely followed by more.
    pub per_page: usize,
}

impl EventPage {
    /// Whether the server returned a full page (more events likely pending).
    pub fn is_full(&self) -> bool {
        !self.events.is_empty() && self.events.len() == self.per_page
    }

    /// Sequence id of the last event in the page, if any.
    pub fn last_sequence_id(&self) -> Option<u64> {
        self.events.last().map(|e| e.sequence_id)
    }
}

/// The `likedListings` list extracted from a user payload.
///
/// Because `previousValues` is partial, "the path is missing" and "the path
/// is explicitly null" are different facts, and both differ from
/// "present but unusable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikedListings {
    /// The `likedListings` path is not present in the payload.
    Absent,
    /// The path is present with an explicit `null`.
    Null,
    /// A well-formed list of listing ids.
    Ids(Vec<ListingId>),
    /// The path is present but is not a list of UUID strings.
    Malformed,
}

/// Extract `attributes.profile.privateData.likedListings` from a user payload.
///
/// Any missing intermediate level yields [`LikedListings::Absent`]; a present
/// value that is not an array of UUID strings yields
/// [`LikedListings::Malformed`].
pub fn liked_listings(user: &Value) -> LikedListings {
    let node = user
        .get("attributes")
        .and_then(|v| v.get("profile"))
        .and_then(|v| v.get("privateData"))
        .and_then(|v| v.get("likedListings"));

    match node {
        None => LikedListings::Absent,
        Some(Value::Null) => LikedListings::Null,
        Some(Value::Array(items)) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str().and_then(|s| s.parse::<ListingId>().ok()) {
                    Some(id) => ids.push(id),
                    None => return LikedListings::Malformed,
                }
            }
            LikedListings::Ids(ids)
        }
        Some(_) => LikedListings::Malformed,
    }
}
