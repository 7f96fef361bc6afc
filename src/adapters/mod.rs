pub mod bookmaker;
pub mod feed;
pub mod types;

pub use bookmaker::HttpBookmaker;
pub use feed::{start_feed_monitor, HttpReferenceFeed};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Failure taxonomy shared by all bookmaker calls.
///
/// `Authentication` is the only recoverable variant: the worker signs in once
/// and retries the failing call once. Everything else is surfaced as an
/// ordinary per-item failure.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Interface to the target marketplace (browser-automation adapter in the
/// original deployment; an HTTP client here). One in-flight session at a time.
#[async_trait]
pub trait Bookmaker: Send + Sync {
    async fn sign_in(&self, username: &str, password: &str) -> Result<(), AdapterError>;

    async fn account_info(&self, username: &str) -> Result<AccountInfo, AdapterError>;

    /// Resolve a match by team names. `None` when the bookmaker does not list it.
    async fn match_by_teams(
        &self,
        home: &str,
        away: &str,
    ) -> Result<Option<MatchSummary>, AdapterError>;

    /// Fetch the full market list and kickoff time for a known match.
    async fn match_detail(
        &self,
        id: &str,
        name: &str,
    ) -> Result<Option<MatchDetail>, AdapterError>;

    async fn submit_bet(
        &self,
        username: &str,
        order: &BetOrder,
    ) -> Result<BetReceipt, AdapterError>;

    /// Release the underlying session. Best-effort; never fails.
    async fn release(&self);
}

/// Interface to the reference price source.
#[async_trait]
pub trait ReferenceFeed: Send + Sync {
    /// Return the current batch of match notifications.
    async fn poll_notifications(&self) -> anyhow::Result<Vec<Notification>>;

    /// Detailed market payload for one event. `None` when the event is gone.
    async fn detailed_markets(&self, event_id: &str) -> anyhow::Result<Option<ReferencePayload>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
