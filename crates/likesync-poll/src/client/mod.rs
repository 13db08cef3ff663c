//! Rate-limited Integration API client.
//!
//! The marketplace exposes two groups of operations with independent rate
//! ceilings: **queries** (event polling, listing lookups) and **commands**
//! (listing updates). Each group goes through its own [`RateLimiter`], so a
//! burst of listing updates can never starve event polling and vice versa.
//!
//! Authentication uses the OAuth2 client-credentials flow; the bearer token
//! is cached and refreshed ahead of expiry. All transport, auth, and status
//! errors propagate to the caller: silently skipping a batch would
//! desynchronize the cursor from reality.

mod limiter;

pub use limiter::{RateLimit, RateLimiter};

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use likesync_core::{Event, EventPage, Listing, ListingId, USER_UPDATED_EVENT_TYPE};
use metrics::counter;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Request timeout for all API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long before expiry a cached token is refreshed.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Parameters for one event query: resume position or cold-start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventQuery {
    /// Fetch events strictly after this sequence id.
    StartAfterSequenceId(u64),
    /// Fetch events created at or after this instant (no stored cursor).
    CreatedAtStart(DateTime<Utc>),
}

/// The marketplace operations the poll loop depends on.
///
/// The live implementation is [`IntegrationClient`]; tests drive the poll
/// loop with an in-memory fake instead.
pub trait MarketplaceApi {
    /// Fetch one page of `user/updated` events.
    fn query_events(&self, query: EventQuery) -> impl Future<Output = Result<EventPage>> + Send;

    /// Fetch the current state of one listing.
    fn query_listing(&self, id: &ListingId) -> impl Future<Output = Result<Listing>> + Send;

    /// Merge `public_data` into the listing's public data and return the
    /// updated listing.
    fn update_listing(
        &self,
        id: &ListingId,
        public_data: Value,
    ) -> impl Future<Output = Result<Listing>> + Send;
}

/// Configuration for the Integration API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, without a trailing slash.
    pub base_url: String,

    /// OAuth2 client id.
    pub client_id: String,

    /// OAuth2 client secret.
    pub client_secret: String,

    /// Ceiling for the query channel.
    pub query_limit: RateLimit,

    /// Ceiling for the command channel.
    pub command_limit: RateLimit,
}

/// Bearer token with its refresh deadline.
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Rate-limited HTTP client for the marketplace Integration API.
pub struct IntegrationClient {
    http: reqwest::Client,
    config: ClientConfig,
    query_limiter: RateLimiter,
    command_limiter: RateLimiter,
    token: Mutex<Option<CachedToken>>,
}

/// JSON:API-style response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    meta: Option<PageMeta>,
}

/// Pagination metadata on query responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    per_page: usize,
}

/// Wire shape of one event: the payload lives under `attributes`.
#[derive(Debug, Deserialize)]
struct EventResource {
    attributes: Event,
}

impl IntegrationClient {
    /// Create a client with its two limiter channels.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            query_limiter: RateLimiter::new("query", config.query_limit),
            command_limiter: RateLimiter::new("command", config.command_limit),
            token: Mutex::new(None),
            config,
        })
    }

    /// Query parameters for one event query, including the type filter.
    fn event_query_params(query: EventQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("eventTypes", USER_UPDATED_EVENT_TYPE.to_string())];
        match query {
            EventQuery::StartAfterSequenceId(seq) => {
                params.push(("startAfterSequenceId", seq.to_string()));
            }
            EventQuery::CreatedAtStart(at) => {
                params.push(("createdAtStart", at.to_rfc3339()));
            }
        }
        params
    }

    /// Fetch the cached bearer token, refreshing it when near expiry.
    async fn bearer_token(&self) -> Result<String> {
        {
            let token = self.token.lock();
            if let Some(cached) = token.as_ref() {
                if Instant::now() < cached.refresh_at {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let url = format!("{}/v1/auth/token", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", "integ"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        let refresh_at = Instant::now()
            + Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let access_token = token.access_token.clone();

        *self.token.lock() = Some(CachedToken {
            access_token: token.access_token,
            refresh_at,
        });

        tracing::debug!("refreshed integration API bearer token");
        Ok(access_token)
    }

    /// Turn a non-success response into a typed error.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Api { status, body })
        }
    }
}

impl MarketplaceApi for IntegrationClient {
    fn query_events(&self, query: EventQuery) -> impl Future<Output = Result<EventPage>> + Send {
        async move {
            self.query_limiter.acquire().await;
            counter!("api_requests_total", "channel" => "query").increment(1);

            let token = self.bearer_token().await?;
            let url = format!("{}/v1/integration_api/events/query", self.config.base_url);
            let response = self
                .http
                .get(&url)
                .query(&Self::event_query_params(query))
                .bearer_auth(token)
                .send()
                .await?;

            let envelope: Envelope<Vec<EventResource>> =
                Self::check_status(response).await?.json().await?;

            let events: Vec<Event> = envelope
                .data
                .into_iter()
                .map(|resource| resource.attributes)
                .collect();
            let per_page = envelope.meta.map_or(events.len(), |meta| meta.per_page);

            Ok(EventPage { events, per_page })
        }
    }

    fn query_listing(&self, id: &ListingId) -> impl Future<Output = Result<Listing>> + Send {
        async move {
            self.query_limiter.acquire().await;
            counter!("api_requests_total", "channel" => "query").increment(1);

            let token = self.bearer_token().await?;
            let url = format!("{}/v1/integration_api/listings/query", self.config.base_url);
            let response = self
                .http
                .get(&url)
                .query(&[("ids", id.to_string())])
                .bearer_auth(token)
                .send()
                .await?;

            let envelope: Envelope<Vec<Listing>> =
                Self::check_status(response).await?.json().await?;

            envelope
                .data
                .into_iter()
                .next()
                .ok_or(Error::MissingListing(*id))
        }
    }

    fn update_listing(
        &self,
        id: &ListingId,
        public_data: Value,
    ) -> impl Future<Output = Result<Listing>> + Send {
        async move {
            self.command_limiter.acquire().await;
            counter!("api_requests_total", "channel" => "command").increment(1);

            let token = self.bearer_token().await?;
            let url = format!("{}/v1/integration_api/listings/update", self.config.base_url);
            let body = json!({
                "id": id,
                "publicData": public_data,
            });
            let response = self
                .http
                .post(&url)
                .query(&[("expand", "true")])
                .bearer_auth(token)
                .json(&body)
                .send()
                .await?;

            let envelope: Envelope<Listing> = Self::check_status(response).await?.json().await?;
            Ok(envelope.data)
        }
    }
}
