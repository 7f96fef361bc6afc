use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::adapters::types::{Notification, ReferencePayload};
use crate::adapters::ReferenceFeed;

/// HTTP polling client for the reference price source.
pub struct HttpReferenceFeed {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpReferenceFeed {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpReferenceFeed {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.query(&[("key", key.as_str())]),
            None => req,
        }
    }
}

#[async_trait]
impl ReferenceFeed for HttpReferenceFeed {
    async fn poll_notifications(&self) -> Result<Vec<Notification>> {
        let url = format!("{}/feed/notifications", self.base_url);
        let resp = self
            .with_key(self.http.get(&url))
            .send()
            .await
            .context("Reference feed request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Reference feed error {}: {}", status, body);
        }

        let batch: Vec<Notification> = resp
            .json()
            .await
            .context("Failed to parse reference feed batch")?;
        debug!("Reference feed returned {} notification(s)", batch.len());
        Ok(batch)
    }

    async fn detailed_markets(&self, event_id: &str) -> Result<Option<ReferencePayload>> {
        let url = format!("{}/feed/events/{}/markets", self.base_url, event_id);
        let resp = self
            .with_key(self.http.get(&url))
            .send()
            .await
            .context("Detailed market request failed")?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            anyhow::bail!("Detailed market fetch error: {}", resp.status());
        }

        let payload: ReferencePayload = resp
            .json()
            .await
            .context("Failed to parse detailed market payload")?;
        Ok(Some(payload))
    }

    fn name(&self) -> &str {
        "reference-http"
    }
}

/// Spawn a background task that polls the reference feed at the configured
/// interval and forwards notification batches through the returned channel.
///
/// Poll failures are logged and the loop continues; the worker decides what
/// to do with each batch.
pub fn start_feed_monitor(
    feed: Arc<dyn ReferenceFeed>,
    poll_interval: Duration,
) -> mpsc::Receiver<Vec<Notification>> {
    let (tx, rx) = mpsc::channel(1024);

    tokio::spawn(async move {
        info!(
            "Feed monitor started (provider '{}', interval {:?})",
            feed.name(),
            poll_interval
        );
        let poll_timeout = poll_interval.max(Duration::from_secs(2));
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let batch = match tokio::time::timeout(poll_timeout, feed.poll_notifications()).await
            {
                Ok(Ok(batch)) => batch,
                Ok(Err(e)) => {
                    warn!("Provider '{}' failed: {}", feed.name(), e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Provider '{}' timed out after {:?}",
                        feed.name(),
                        poll_timeout
                    );
                    continue;
                }
            };

            if batch.is_empty() {
                continue;
            }
            // Log when batches are dropped instead of silently ignoring
            if let Err(e) = tx.try_send(batch) {
                error!("Notification channel full, batch DROPPED: {}", e);
            }
        }
    });

    rx
}
