//! Marketplace like-count sync daemon.
//!
//! Polls the marketplace event stream for `user/updated` events, derives
//! per-listing like-count deltas, and applies them through the rate-limited
//! Integration API client. The sequence id of the last processed event is
//! persisted to a plain-text state file so polling resumes from the correct
//! position after a restart.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐      ┌──────────────┐      ┌───────────────────┐
//! │  Poll Loop  │ ───▶ │ Event Differ │ ───▶ │ {listing → delta} │
//! └──────┬──────┘      └──────────────┘      └─────────┬─────────┘
//!        │ query events                                │ read-modify-write
//!        ▼                                             ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │            Rate-Limited Integration API Client               │
//! │            (query channel │ command channel)                 │
//! └──────────────────────────────────────────────────────────────┘
//!        │ after updates settle
//!        ▼
//! ┌──────────────┐
//! │ Cursor Store │  plain-text sequence id, read once at startup
//! └──────────────┘
//! ```
//!
//! Cycles never overlap: the next fetch starts only after the previous
//! cycle's updates and cursor write completed.

pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod poll;

pub use client::{ClientConfig, EventQuery, IntegrationClient, MarketplaceApi, RateLimit, RateLimiter};
pub use config::{Config, RateProfile};
pub use cursor::CursorStore;
pub use error::{Error, Result};
pub use poll::{CycleStats, Poller, PollerConfig};
