//! Core types, like-diff logic, and shared utilities for the likesync daemon.
//!
//! This crate provides:
//! - The marketplace event and listing models consumed by the poller
//! - Liked-listings extraction from partial user snapshots
//! - The event differ that turns a batch of `user/updated` events into
//!   per-listing like-count deltas
//! - Prometheus metrics helpers

pub mod diff;
pub mod event;
pub mod listing;
pub mod metrics;

/// The only event type the poller subscribes to.
pub const USER_UPDATED_EVENT_TYPE: &str = "user/updated";

pub use diff::{
    DiffStats, EventOutcome, IgnoreReason, LikeAggregate, aggregate_events, classify_event,
};
pub use event::{Event, EventPage, LikedListings, liked_listings};
pub use listing::{Listing, ListingAttributes, ListingId};
