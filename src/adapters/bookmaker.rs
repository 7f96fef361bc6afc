use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::adapters::types::{AccountInfo, BetOrder, BetReceipt, MatchDetail, MatchSummary};
use crate::adapters::{AdapterError, Bookmaker};
use crate::store::Store;

/// HTTP client for the target marketplace's session API.
///
/// Session state (cookies, access token) round-trips through the store so a
/// restarted bot can resume without a fresh sign-in. The marketplace
/// tolerates a single automated session, so callers serialize access.
#[derive(Clone)]
pub struct HttpBookmaker {
    http: Client,
    base_url: String,
    store: Store,
}

impl HttpBookmaker {
    pub fn new(base_url: &str, store: Store) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(HttpBookmaker {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    fn auth_headers(&self) -> Result<(Option<String>, Option<String>), AdapterError> {
        let cookies = self
            .store
            .get_session_cookies()
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        let token = self
            .store
            .get_access_token()
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        Ok((cookies, token))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, AdapterError> {
        let (cookies, token) = self.auth_headers()?;
        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(cookies) = cookies {
            req = req.header("Cookie", cookies);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Authentication(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Unavailable(format!("{}: {}", status, body)));
        }
        Ok(resp)
    }

    fn transport(e: reqwest::Error) -> AdapterError {
        AdapterError::Unavailable(e.to_string())
    }

    fn parse(e: reqwest::Error) -> AdapterError {
        AdapterError::InvalidResponse(e.to_string())
    }
}

#[async_trait]
impl Bookmaker for HttpBookmaker {
    async fn sign_in(&self, username: &str, password: &str) -> Result<(), AdapterError> {
        info!("Signing in to bookmaker as '{}'", username);
        let body = serde_json::json!({ "username": username, "password": password });
        let resp = self
            .http
            .post(format!("{}/api/session", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Authentication(format!(
                "sign-in rejected: {}",
                body
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Unavailable(format!("{}: {}", status, body)));
        }

        // Persist the refreshed session state for the next call and the
        // next process.
        let cookies: Vec<String> = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::to_string)
            .collect();
        if !cookies.is_empty() {
            self.store
                .set_session_cookies(&cookies.join("; "))
                .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        }
        let parsed: serde_json::Value = resp.json().await.map_err(Self::parse)?;
        if let Some(token) = parsed["accessToken"].as_str() {
            self.store
                .set_access_token(token)
                .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        }
        info!("Bookmaker session established");
        Ok(())
    }

    async fn account_info(&self, username: &str) -> Result<AccountInfo, AdapterError> {
        let resp = self
            .request(reqwest::Method::GET, "/api/account")?
            .query(&[("username", username)])
            .send()
            .await
            .map_err(Self::transport)?;
        let resp = Self::check(resp).await?;
        let info: AccountInfo = resp.json().await.map_err(Self::parse)?;
        debug!(
            "Account info: balance={:.2}, open_bets={}",
            info.balance, info.open_bets
        );
        Ok(info)
    }

    async fn match_by_teams(
        &self,
        home: &str,
        away: &str,
    ) -> Result<Option<MatchSummary>, AdapterError> {
        let resp = self
            .request(reqwest::Method::GET, "/api/events/search")?
            .query(&[("home", home), ("away", away)])
            .send()
            .await
            .map_err(Self::transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(resp).await?;
        let summary: Option<MatchSummary> = resp.json().await.map_err(Self::parse)?;
        Ok(summary)
    }

    async fn match_detail(
        &self,
        id: &str,
        name: &str,
    ) -> Result<Option<MatchDetail>, AdapterError> {
        debug!("Fetching match detail for '{}' ({})", name, id);
        let resp = self
            .request(reqwest::Method::GET, &format!("/api/events/{}", id))?
            .send()
            .await
            .map_err(Self::transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(resp).await?;
        let detail: MatchDetail = resp.json().await.map_err(Self::parse)?;
        Ok(Some(detail))
    }

    async fn submit_bet(
        &self,
        username: &str,
        order: &BetOrder,
    ) -> Result<BetReceipt, AdapterError> {
        info!(
            "Submitting bet: match={}, market='{}', selection='{}', odds={:.3}, stake={:.2}",
            order.match_id, order.market, order.selection, order.odds, order.stake
        );
        let resp = self
            .request(reqwest::Method::POST, "/api/bets")?
            .query(&[("username", username)])
            .json(order)
            .send()
            .await
            .map_err(Self::transport)?;
        let resp = Self::check(resp).await?;
        let receipt: BetReceipt = resp.json().await.map_err(Self::parse)?;
        info!("Bet accepted, id={}", receipt.bet_id);
        Ok(receipt)
    }

    async fn release(&self) {
        // Best-effort: the session server reaps idle sessions anyway.
        match self.request(reqwest::Method::DELETE, "/api/session") {
            Ok(req) => {
                if let Err(e) = req.send().await {
                    warn!("Session release failed: {}", e);
                }
            }
            Err(e) => warn!("Session release skipped: {}", e),
        }
    }
}
