//! Marketplace listing model.

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier of a marketplace listing.
pub type ListingId = Uuid;

/// A marketplace listing as returned by the Integration API.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    #[serde(default)]
    pub attributes: ListingAttributes,
}

/// Listing attributes; only the public-data subtree matters here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingAttributes {
    /// Listing title, when expanded in the response.
    #[serde(default)]
    pub title: Option<String>,

    /// Free-form public data; the denormalized like count lives under the
    /// `likes` key.
    #[serde(default)]
    pub public_data: Map<String, Value>,
}

impl Listing {
    /// Current like count, treating a missing or non-integer value as zero.
    pub fn likes(&self) -> i64 {
        self.attributes
            .public_data
            .get("likes")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}
