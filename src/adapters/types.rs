use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One candidate match pushed by the reference price source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Reference-source event ID, used for queue deduplication
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    /// Reference-source sport discriminator ("1" = three-way, "2" = two-way)
    #[serde(default = "default_sport_id")]
    pub sport_id: String,
    pub kickoff: DateTime<Utc>,
    /// Line type that triggered the notification (e.g. "totals")
    pub line_type: String,
    /// Specific line value for sub-keyed line types (e.g. "2.5")
    #[serde(default)]
    pub line_value: Option<String>,
    /// Outcome the notification was raised for (e.g. "over")
    pub outcome: String,
    /// Raw reference price for that outcome
    pub price: f64,
}

fn default_sport_id() -> String {
    "1".to_string()
}

/// Full reference-source market payload for one event: line type -> body.
///
/// The body is either a flat outcome->price object (money line), an object of
/// line value -> outcome->price sub-markets (totals, handicaps), or null.
/// Prices may arrive as numbers or numeric strings; the bridge tolerates both.
pub type ReferencePayload = BTreeMap<String, serde_json::Value>;

/// A bookmaker market with its priced selections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMarket {
    pub name: String,
    /// Numeric market parameter (handicap points, total line); absent for
    /// money-line style markets
    #[serde(default)]
    pub special_value: Option<String>,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    /// Decimal odds
    pub odds: f64,
}

/// Match search result from the bookmaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: String,
    pub name: String,
}

/// Full match page: markets, selections and scheduled kickoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDetail {
    pub id: String,
    pub name: String,
    pub kickoff: DateTime<Utc>,
    pub markets: Vec<TargetMarket>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: f64,
    pub open_bets: u32,
}

/// Bet submission payload sent to the bookmaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetOrder {
    pub match_id: String,
    pub market: String,
    pub selection: String,
    pub odds: f64,
    pub stake: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetReceipt {
    pub bet_id: String,
}
