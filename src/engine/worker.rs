//! Sequential queue worker and session state machine.
//!
//! One logical worker per bot session drains match notifications strictly
//! FIFO. The bookmaker session and the bankroll are single-threaded and
//! order-sensitive, so no concurrency is permitted between items; the only
//! suspension points are the external calls and the inter-item delay.

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::adapters::types::{AccountInfo, BetOrder, Notification};
use crate::adapters::{AdapterError, Bookmaker, ReferenceFeed};
use crate::config::Config;
use crate::engine::evaluate::{evaluate, Thresholds, ValuedBet};
use crate::engine::stake::{floor_cents, kelly_stake};
use crate::store::{PlacedBet, Store};

/// Maximum disagreement between the reference and bookmaker kickoff times
/// before a match is treated as a mis-resolution and skipped.
const KICKOFF_TOLERANCE_SECS: i64 = 300;

/// A batch of exactly this size is the feed's bulk/backfill dump and is
/// discarded by policy.
const BULK_DUMP_SIZE: usize = 250;

/// Snapshot consumed by the control layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub is_bot_active: bool,
    pub is_worker_running: bool,
    pub queue_length: usize,
    pub bankroll: Option<f64>,
    pub open_bets: u32,
    pub min_odds: f64,
    pub max_odds: f64,
}

/// Per-bot session: owns the queue, the dedup index and the bankroll.
/// Nothing else mutates them.
pub struct BotSession {
    config: Config,
    store: Store,
    bookmaker: Arc<dyn Bookmaker>,
    feed: Arc<dyn ReferenceFeed>,
    stop_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<SessionStatus>,

    queue: VecDeque<Notification>,
    seen: HashSet<String>,
    draining: bool,
    active: bool,
    bankroll: Option<f64>,
    open_bets: u32,
    username: String,
    password: String,
}

impl BotSession {
    pub fn new(
        config: Config,
        store: Store,
        bookmaker: Arc<dyn Bookmaker>,
        feed: Arc<dyn ReferenceFeed>,
        stop_rx: watch::Receiver<bool>,
    ) -> (Self, watch::Receiver<SessionStatus>) {
        let username = config.bookmaker_username.clone().unwrap_or_default();
        let password = config.bookmaker_password.clone().unwrap_or_default();
        let initial = SessionStatus {
            is_bot_active: false,
            is_worker_running: false,
            queue_length: 0,
            bankroll: None,
            open_bets: 0,
            min_odds: config.min_odds,
            max_odds: config.max_odds,
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let session = BotSession {
            config,
            store,
            bookmaker,
            feed,
            stop_rx,
            status_tx,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            draining: false,
            active: false,
            bankroll: None,
            open_bets: 0,
            username,
            password,
        };
        (session, status_rx)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            is_bot_active: self.active,
            is_worker_running: self.draining,
            queue_length: self.queue.len(),
            bankroll: self.bankroll,
            open_bets: self.open_bets,
            min_odds: self.config.min_odds,
            max_odds: self.config.max_odds,
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }

    fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_edge_percent: self.config.min_edge_percent,
            min_odds: self.config.min_odds,
            max_odds: self.config.max_odds,
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Main loop: consume notification batches until the channel closes or
    /// a stop is requested. Fatal errors (bankroll unobtainable) bubble up
    /// so the process can exit nonzero.
    pub async fn run(
        mut self,
        mut notifications: mpsc::Receiver<Vec<Notification>>,
    ) -> Result<()> {
        self.active = true;
        self.publish_status();
        info!("Bot session started");

        let mut stop_rx = self.stop_rx.clone();
        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        info!("Stop requested");
                        break;
                    }
                }
                batch = notifications.recv() => {
                    match batch {
                        Some(batch) => self.enqueue(batch).await?,
                        None => {
                            info!("Notification feed closed");
                            break;
                        }
                    }
                }
            }
        }

        self.stop().await;
        Ok(())
    }

    /// Append a batch to the queue tail (after event-id dedup) and attempt
    /// a drain. No-op while a drain is already in flight.
    pub async fn enqueue(&mut self, batch: Vec<Notification>) -> Result<()> {
        if batch.len() == BULK_DUMP_SIZE {
            warn!(
                "Discarding bulk dump of {} notifications by policy",
                batch.len()
            );
            return Ok(());
        }

        for n in batch {
            if self.seen.insert(n.event_id.clone()) {
                self.queue.push_back(n);
            } else {
                debug!("Duplicate event {} dropped", n.event_id);
            }
        }
        self.publish_status();
        self.drain().await
    }

    /// Single-flight drain: at most one loop runs per session.
    async fn drain(&mut self) -> Result<()> {
        if !self.active || self.draining {
            return Ok(());
        }
        self.draining = true;
        self.publish_status();
        let result = self.drain_loop().await;
        self.draining = false;
        self.publish_status();
        result
    }

    async fn drain_loop(&mut self) -> Result<()> {
        if self.bankroll.is_none() {
            self.establish_bankroll().await?;
        }

        while let Some(item) = self.next_item() {
            if let Err(e) = self.process_item(&item).await {
                warn!("Skipping event {} after failure: {:#}", item.event_id, e);
            }
            self.publish_status();
            self.inter_item_delay().await;
        }
        Ok(())
    }

    fn next_item(&mut self) -> Option<Notification> {
        if !self.active || self.stop_requested() {
            return None;
        }
        self.queue.pop_front()
    }

    /// Establish the bankroll before the first item. An authentication
    /// failure gets one sign-in-and-retry; anything else is terminal for
    /// the whole session.
    async fn establish_bankroll(&mut self) -> Result<()> {
        if self.config.dry_run {
            let snapshot = self.store.get_bankroll_snapshot()?;
            let bankroll = snapshot.unwrap_or(self.config.initial_balance);
            info!("Dry-run bankroll: {:.2}", bankroll);
            self.bankroll = Some(bankroll);
            self.publish_status();
            return Ok(());
        }

        let bookmaker = Arc::clone(&self.bookmaker);
        let username = self.username.clone();
        let info = self
            .with_reauth(move || {
                let bookmaker = Arc::clone(&bookmaker);
                let username = username.clone();
                async move { bookmaker.account_info(&username).await }
            })
            .await
            .context("bankroll could not be established, terminating session")?;
        self.apply_account_info(info)?;
        info!(
            "Bankroll established: {:.2} ({} open bets)",
            info.balance, info.open_bets
        );
        Ok(())
    }

    fn apply_account_info(&mut self, info: AccountInfo) -> Result<()> {
        // Bankroll is never negative.
        self.bankroll = Some(info.balance.max(0.0));
        self.open_bets = info.open_bets;
        self.store.set_bankroll_snapshot(info.balance.max(0.0))?;
        self.publish_status();
        Ok(())
    }

    /// One queued item end to end. Failures are contained to this item.
    async fn process_item(&mut self, n: &Notification) -> Result<()> {
        info!(
            "Processing event {}: {} vs {} ({}/{})",
            n.event_id, n.home_team, n.away_team, n.line_type, n.sport_id
        );

        let Some(summary) = self
            .bookmaker
            .match_by_teams(&n.home_team, &n.away_team)
            .await?
        else {
            info!("No bookmaker match for '{} vs {}'", n.home_team, n.away_team);
            return Ok(());
        };

        let Some(detail) = self
            .bookmaker
            .match_detail(&summary.id, &summary.name)
            .await?
        else {
            info!("Match '{}' disappeared before detail fetch", summary.name);
            return Ok(());
        };

        let skew = (detail.kickoff - n.kickoff).num_seconds().abs();
        if skew > KICKOFF_TOLERANCE_SECS {
            warn!(
                "Kickoff disagreement for '{}': {}s apart, likely wrong match",
                summary.name, skew
            );
            return Ok(());
        }

        let Some(payload) = self.feed.detailed_markets(&n.event_id).await? else {
            info!("Reference payload gone for event {}", n.event_id);
            return Ok(());
        };

        let picks = evaluate(
            &detail.markets,
            &payload,
            &n.sport_id,
            self.config.devig_method,
            &self.thresholds(),
        );
        if picks.is_empty() {
            info!("No qualifying value bets for '{}'", summary.name);
            return Ok(());
        }

        for pick in &picks {
            self.place_bet(n, &detail.id, pick).await?;
        }
        Ok(())
    }

    async fn place_bet(&mut self, n: &Notification, match_id: &str, pick: &ValuedBet) -> Result<()> {
        let bankroll = self.bankroll.unwrap_or(0.0);
        let stake = if self.config.fixed_stake {
            floor_cents(self.config.fixed_stake_amount.min(bankroll))
        } else {
            kelly_stake(
                pick.fair_odds,
                pick.target_odds,
                bankroll,
                self.config.stake_fraction,
            )
        };
        if stake <= 0.0 {
            // The Kelly gate is stricter than the percentage-edge gate and
            // may veto a bet the evaluator promoted.
            info!(
                "Zero stake for '{}' / '{}' (edge {:.2}%), skipping",
                pick.market, pick.selection, pick.edge
            );
            return Ok(());
        }

        info!(
            "Staking {:.2} on '{}' / '{}' @ {:.3} (fair {:.3}, edge {:.2}%)",
            stake, pick.market, pick.selection, pick.target_odds, pick.fair_odds, pick.edge
        );

        if self.config.dry_run {
            info!("[DRY RUN] Would submit bet – no real funds used");
            self.record_bet(n, pick, stake)?;
            let remaining = (bankroll - stake).max(0.0);
            self.bankroll = Some(remaining);
            self.store.set_bankroll_snapshot(remaining)?;
            self.publish_status();
            return Ok(());
        }

        let order = BetOrder {
            match_id: match_id.to_string(),
            market: pick.market.clone(),
            selection: pick.selection.clone(),
            odds: pick.target_odds,
            stake,
        };
        let bookmaker = Arc::clone(&self.bookmaker);
        let username = self.username.clone();
        let receipt = self
            .with_reauth(move || {
                let bookmaker = Arc::clone(&bookmaker);
                let username = username.clone();
                let order = order.clone();
                async move { bookmaker.submit_bet(&username, &order).await }
            })
            .await?;
        info!("Bet placed, id={}", receipt.bet_id);
        self.record_bet(n, pick, stake)?;
        self.open_bets = self.open_bets.saturating_add(1);

        // Stale bankroll after a bet would mis-size the next one; refresh
        // immediately. A refresh failure is logged and carried forward.
        match self.bookmaker.account_info(&self.username).await {
            Ok(info) => self.apply_account_info(info)?,
            Err(e) => warn!("Bankroll refresh failed, carrying stale value: {}", e),
        }
        Ok(())
    }

    fn record_bet(&self, n: &Notification, pick: &ValuedBet, stake: f64) -> Result<()> {
        self.store.record_bet(&PlacedBet {
            id: None,
            event_id: n.event_id.clone(),
            market: pick.market.clone(),
            selection: pick.selection.clone(),
            odds: pick.target_odds,
            stake,
            edge: pick.edge,
            dry_run: self.config.dry_run,
            placed_at: Utc::now(),
        })?;
        Ok(())
    }

    /// Bounded re-auth policy: on an authentication failure, sign in once
    /// and retry the call once. All other errors pass straight through.
    async fn with_reauth<T, F, Fut>(&self, op: F) -> Result<T, AdapterError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        match op().await {
            Err(AdapterError::Authentication(reason)) => {
                warn!("Authentication failure ({}), re-signing in", reason);
                self.bookmaker
                    .sign_in(&self.username, &self.password)
                    .await?;
                op().await
            }
            other => other,
        }
    }

    /// Fixed inter-item delay plus a little jitter, as backpressure against
    /// the bookmaker.
    async fn inter_item_delay(&self) {
        let base = Duration::from_secs(self.config.inter_item_delay_secs);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
        tokio::time::sleep(base + jitter).await;
    }

    /// Tear the session down: clear the queue and dedup index, reset flags,
    /// persist the bankroll and release the bookmaker session.
    pub async fn stop(&mut self) {
        info!("Stopping bot session ({} queued items dropped)", self.queue.len());
        self.queue.clear();
        self.seen.clear();
        self.draining = false;
        self.active = false;
        if let Some(bankroll) = self.bankroll {
            if let Err(e) = self.store.set_bankroll_snapshot(bankroll) {
                warn!("Failed to persist bankroll snapshot: {}", e);
            }
        }
        self.bookmaker.release().await;
        self.publish_status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::types::{
        BetReceipt, MatchDetail, MatchSummary, ReferencePayload, Selection, TargetMarket,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct MockBookmaker {
        auth_failures_left: Mutex<u32>,
        submit_auth_failures_left: Mutex<u32>,
        search_failures_left: Mutex<u32>,
        sign_ins: AtomicU32,
        submitted: Mutex<Vec<BetOrder>>,
        balance: Mutex<f64>,
        kickoff: DateTime<Utc>,
        markets: Vec<TargetMarket>,
    }

    impl MockBookmaker {
        fn new(balance: f64, kickoff: DateTime<Utc>, markets: Vec<TargetMarket>) -> Self {
            MockBookmaker {
                auth_failures_left: Mutex::new(0),
                submit_auth_failures_left: Mutex::new(0),
                search_failures_left: Mutex::new(0),
                sign_ins: AtomicU32::new(0),
                submitted: Mutex::new(Vec::new()),
                balance: Mutex::new(balance),
                kickoff,
                markets,
            }
        }
    }

    #[async_trait]
    impl Bookmaker for MockBookmaker {
        async fn sign_in(&self, _username: &str, _password: &str) -> Result<(), AdapterError> {
            self.sign_ins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn account_info(&self, _username: &str) -> Result<AccountInfo, AdapterError> {
            let mut left = self.auth_failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(AdapterError::Authentication("session expired".into()));
            }
            Ok(AccountInfo {
                balance: *self.balance.lock().unwrap(),
                open_bets: self.submitted.lock().unwrap().len() as u32,
            })
        }

        async fn match_by_teams(
            &self,
            home: &str,
            away: &str,
        ) -> Result<Option<MatchSummary>, AdapterError> {
            let mut left = self.search_failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(AdapterError::Unavailable("search timed out".into()));
            }
            Ok(Some(MatchSummary {
                id: "m1".into(),
                name: format!("{} vs {}", home, away),
            }))
        }

        async fn match_detail(
            &self,
            id: &str,
            name: &str,
        ) -> Result<Option<MatchDetail>, AdapterError> {
            Ok(Some(MatchDetail {
                id: id.to_string(),
                name: name.to_string(),
                kickoff: self.kickoff,
                markets: self.markets.clone(),
            }))
        }

        async fn submit_bet(
            &self,
            _username: &str,
            order: &BetOrder,
        ) -> Result<BetReceipt, AdapterError> {
            {
                let mut left = self.submit_auth_failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(AdapterError::Authentication("bet slip rejected".into()));
                }
            }
            *self.balance.lock().unwrap() -= order.stake;
            self.submitted.lock().unwrap().push(order.clone());
            Ok(BetReceipt {
                bet_id: format!("bet-{}", self.submitted.lock().unwrap().len()),
            })
        }

        async fn release(&self) {}
    }

    struct MockFeed {
        payload: Option<ReferencePayload>,
    }

    #[async_trait]
    impl ReferenceFeed for MockFeed {
        async fn poll_notifications(&self) -> anyhow::Result<Vec<Notification>> {
            Ok(Vec::new())
        }

        async fn detailed_markets(
            &self,
            _event_id: &str,
        ) -> anyhow::Result<Option<ReferencePayload>> {
            Ok(self.payload.clone())
        }

        fn name(&self) -> &str {
            "mock-feed"
        }
    }

    fn test_config(dry_run: bool) -> Config {
        Config {
            dry_run,
            initial_balance: 100.0,
            status_addr: "127.0.0.1:0".into(),
            store_path: ":memory:".into(),
            bookmaker_url: "https://bookmaker.example.com".into(),
            bookmaker_username: Some("user".into()),
            bookmaker_password: Some("pass".into()),
            reference_url: "https://feed.example.com".into(),
            reference_api_key: None,
            poll_interval_secs: 5,
            stake_fraction: 0.1,
            fixed_stake: false,
            fixed_stake_amount: 0.0,
            min_edge_percent: 5.5,
            min_odds: 1.45,
            max_odds: 3.5,
            inter_item_delay_secs: 0,
            devig_method: crate::engine::devig::DevigMethod::Power,
        }
    }

    fn totals_markets() -> Vec<TargetMarket> {
        vec![TargetMarket {
            name: "Total Goals".into(),
            special_value: Some("2.5".into()),
            selections: vec![
                Selection {
                    name: "Over".into(),
                    odds: 2.2,
                },
                Selection {
                    name: "Under".into(),
                    odds: 1.7,
                },
            ],
        }]
    }

    fn totals_payload() -> ReferencePayload {
        serde_json::from_value(serde_json::json!({
            "totals": { "2.5": { "over": 1.9, "under": 1.84 } }
        }))
        .unwrap()
    }

    fn notification(event_id: &str, kickoff: DateTime<Utc>) -> Notification {
        Notification {
            event_id: event_id.to_string(),
            home_team: "A".into(),
            away_team: "B".into(),
            sport_id: "1".into(),
            kickoff,
            line_type: "totals".into(),
            line_value: Some("2.5".into()),
            outcome: "over".into(),
            price: 1.9,
        }
    }

    fn session(
        config: Config,
        bookmaker: Arc<MockBookmaker>,
        payload: Option<ReferencePayload>,
    ) -> BotSession {
        let store = Store::open(":memory:").unwrap();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let feed = Arc::new(MockFeed { payload });
        let (session, _status_rx) =
            BotSession::new(config, store, bookmaker, feed, stop_rx);
        session
    }

    #[tokio::test]
    async fn test_duplicate_event_id_enqueued_once() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(100.0, kickoff, totals_markets()));
        // Session not yet active: items stay queued so the dedup result is
        // observable.
        let mut session = session(test_config(true), bookmaker, Some(totals_payload()));

        session
            .enqueue(vec![notification("X", kickoff), notification("X", kickoff)])
            .await
            .unwrap();
        assert_eq!(session.status().queue_length, 1);

        session.enqueue(vec![notification("X", kickoff)]).await.unwrap();
        assert_eq!(session.status().queue_length, 1);
    }

    #[tokio::test]
    async fn test_bulk_dump_discarded() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(100.0, kickoff, totals_markets()));
        let mut session = session(test_config(true), bookmaker, Some(totals_payload()));

        let batch: Vec<Notification> = (0..250)
            .map(|i| notification(&format!("ev-{}", i), kickoff))
            .collect();
        session.enqueue(batch).await.unwrap();
        assert_eq!(session.status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_auth_failure_recovers_via_single_sign_in() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        *bookmaker.auth_failures_left.lock().unwrap() = 1;

        let mut session = session(
            test_config(false),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        session
            .enqueue(vec![notification("X", kickoff)])
            .await
            .unwrap();

        assert_eq!(bookmaker.sign_ins.load(Ordering::SeqCst), 1);
        assert!(session.bankroll.is_some());
        // The drain proceeded: the Over bet qualifies and was submitted.
        assert_eq!(bookmaker.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_auth_failure_is_fatal() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        *bookmaker.auth_failures_left.lock().unwrap() = 2;

        let mut session = session(
            test_config(false),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        let result = session.enqueue(vec![notification("X", kickoff)]).await;
        assert!(result.is_err());
        assert_eq!(bookmaker.sign_ins.load(Ordering::SeqCst), 1);
        assert!(bookmaker.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submission_auth_failure_recovers_and_resubmits() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        *bookmaker.submit_auth_failures_left.lock().unwrap() = 1;

        let mut session = session(
            test_config(false),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        session
            .enqueue(vec![notification("X", kickoff)])
            .await
            .unwrap();

        // One sign-in, then the resubmission went through.
        assert_eq!(bookmaker.sign_ins.load(Ordering::SeqCst), 1);
        assert_eq!(bookmaker.submitted.lock().unwrap().len(), 1);
        assert_eq!(session.store.recent_bets(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_submission_auth_failure_contained_to_item() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        // Both the submission and its post-sign-in retry fail for the first
        // item; unlike the bankroll path this must not end the session.
        *bookmaker.submit_auth_failures_left.lock().unwrap() = 2;

        let mut session = session(
            test_config(false),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        session
            .enqueue(vec![
                notification("X1", kickoff),
                notification("X2", kickoff),
            ])
            .await
            .unwrap();

        assert_eq!(bookmaker.sign_ins.load(Ordering::SeqCst), 1);
        let submitted = bookmaker.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let bets = session.store.recent_bets(10).unwrap();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].event_id, "X2");
        assert_eq!(session.status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_item_failure_does_not_abort_drain() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        // First match lookup fails with a non-auth error.
        *bookmaker.search_failures_left.lock().unwrap() = 1;

        let mut session = session(
            test_config(false),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        session
            .enqueue(vec![
                notification("X1", kickoff),
                notification("X2", kickoff),
            ])
            .await
            .unwrap();

        // No sign-in was attempted and the second item was still processed.
        assert_eq!(bookmaker.sign_ins.load(Ordering::SeqCst), 0);
        let submitted = bookmaker.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let bets = session.store.recent_bets(10).unwrap();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].event_id, "X2");
        assert_eq!(session.status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_end_to_end_bet_placed_and_bankroll_refreshed() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        let mut session = session(
            test_config(false),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        session
            .enqueue(vec![notification("X", kickoff)])
            .await
            .unwrap();

        let submitted = bookmaker.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let order = &submitted[0];
        assert_eq!(order.selection, "Over");
        assert!(order.stake > 0.0);
        // Bankroll was refreshed from the account after submission.
        assert_eq!(session.bankroll, Some(500.0 - order.stake));
        assert_eq!(session.open_bets, 1);

        let bets = session.store.recent_bets(10).unwrap();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].event_id, "X");
    }

    #[tokio::test]
    async fn test_kickoff_disagreement_skips_item() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        // Bookmaker lists the match 10 minutes later than the reference.
        let bookmaker = Arc::new(MockBookmaker::new(
            500.0,
            kickoff + ChronoDuration::minutes(10),
            totals_markets(),
        ));
        let mut session = session(
            test_config(false),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        session
            .enqueue(vec![notification("X", kickoff)])
            .await
            .unwrap();
        assert!(bookmaker.submitted.lock().unwrap().is_empty());
        assert_eq!(session.status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_dry_run_records_without_submitting() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        let mut session = session(
            test_config(true),
            Arc::clone(&bookmaker),
            Some(totals_payload()),
        );
        session.active = true;

        session
            .enqueue(vec![notification("X", kickoff)])
            .await
            .unwrap();

        assert!(bookmaker.submitted.lock().unwrap().is_empty());
        let bets = session.store.recent_bets(10).unwrap();
        assert_eq!(bets.len(), 1);
        assert!(bets[0].dry_run);
        // Simulated bankroll decremented by the stake.
        assert_eq!(session.bankroll, Some(100.0 - bets[0].stake));
    }

    #[tokio::test]
    async fn test_stop_clears_queue_and_dedup_index() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(100.0, kickoff, totals_markets()));
        let mut session = session(test_config(true), bookmaker, Some(totals_payload()));

        session.enqueue(vec![notification("X", kickoff)]).await.unwrap();
        assert_eq!(session.status().queue_length, 1);

        session.stop().await;
        let status = session.status();
        assert_eq!(status.queue_length, 0);
        assert!(!status.is_bot_active);
        assert!(!status.is_worker_running);

        // Dedup index was cleared: the same event can be queued again.
        session.enqueue(vec![notification("X", kickoff)]).await.unwrap();
        assert_eq!(session.status().queue_length, 1);
    }

    #[tokio::test]
    async fn test_fixed_stake_bypasses_kelly() {
        let kickoff = Utc::now() + ChronoDuration::hours(1);
        let bookmaker = Arc::new(MockBookmaker::new(500.0, kickoff, totals_markets()));
        let mut config = test_config(false);
        config.fixed_stake = true;
        config.fixed_stake_amount = 7.5;
        let mut session = session(config, Arc::clone(&bookmaker), Some(totals_payload()));
        session.active = true;

        session
            .enqueue(vec![notification("X", kickoff)])
            .await
            .unwrap();

        let submitted = bookmaker.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert!((submitted[0].stake - 7.5).abs() < 1e-9);
    }
}
