//! Value evaluator: scores every bridged market group against the de-vigged
//! reference prices and promotes the bets that clear the configured
//! thresholds.
//!
//! Two deliberate phases: best candidate per market first, threshold filter
//! second. The unfiltered view stays useful for diagnostics even when
//! nothing qualifies.

use std::cmp::Ordering;
use tracing::debug;

use crate::adapters::types::{ReferencePayload, TargetMarket};
use crate::engine::bridge::{bridge_markets, MatchedBet};
use crate::engine::devig::{fair_odds, DevigMethod};

/// Odds band and minimum edge a bet must clear to be stakeable.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Minimum edge in percent (e.g. 5.5 = 5.5%)
    pub min_edge_percent: f64,
    pub min_odds: f64,
    pub max_odds: f64,
}

/// A matched bet with its fair price and computed edge.
///
/// `edge == f64::NEG_INFINITY` means the bet could not be valued (fewer than
/// two priced siblings, or the de-vig failed); such bets never qualify.
#[derive(Debug, Clone)]
pub struct ValuedBet {
    pub market: String,
    pub selection: String,
    pub special_value: Option<String>,
    pub target_odds: f64,
    pub fair_probability: f64,
    pub fair_odds: f64,
    pub edge: f64,
}

impl ValuedBet {
    fn unvalued(bet: &MatchedBet) -> Self {
        ValuedBet {
            market: bet.target.market.clone(),
            selection: bet.target.selection.clone(),
            special_value: bet.target.special_value.clone(),
            target_odds: bet.target.odds,
            fair_probability: 0.0,
            fair_odds: 0.0,
            edge: f64::NEG_INFINITY,
        }
    }
}

/// Best candidate in every bridged market group, unfiltered. Ties on edge
/// keep the first bet encountered.
pub fn best_per_market(
    target: &[TargetMarket],
    payload: &ReferencePayload,
    sport_id: &str,
    method: DevigMethod,
) -> Vec<ValuedBet> {
    let groups = bridge_markets(target, payload, sport_id);
    let mut bests = Vec::with_capacity(groups.len());
    for (_, bets) in groups {
        let mut best: Option<ValuedBet> = None;
        for bet in &bets {
            let valued = value_bet(bet, method);
            match &best {
                Some(current) if valued.edge <= current.edge => {}
                _ => best = Some(valued),
            }
        }
        if let Some(b) = best {
            bests.push(b);
        }
    }
    bests
}

/// Stakeable bets, descending by edge. Empty when the bridge produced no
/// matches or none cleared the thresholds.
pub fn evaluate(
    target: &[TargetMarket],
    payload: &ReferencePayload,
    sport_id: &str,
    method: DevigMethod,
    thresholds: &Thresholds,
) -> Vec<ValuedBet> {
    let mut qualified: Vec<ValuedBet> = best_per_market(target, payload, sport_id, method)
        .into_iter()
        .inspect(|b| {
            debug!(
                "Best in '{}': {} @ {:.3} (fair {:.3}, edge {:.2}%)",
                b.market, b.selection, b.target_odds, b.fair_odds, b.edge
            );
        })
        .filter(|b| qualifies(b, thresholds))
        .collect();

    qualified.sort_by(|a, b| b.edge.partial_cmp(&a.edge).unwrap_or(Ordering::Equal));
    qualified
}

fn qualifies(bet: &ValuedBet, t: &Thresholds) -> bool {
    bet.edge > t.min_edge_percent
        && bet.target_odds >= t.min_odds
        && bet.target_odds <= t.max_odds
}

/// Edge of one matched bet: de-vig the sibling prices and compare the
/// bookmaker's quote against the fair odds of the matched outcome.
fn value_bet(bet: &MatchedBet, method: DevigMethod) -> ValuedBet {
    let siblings = &bet.source.siblings;
    if siblings.len() < 2 {
        return ValuedBet::unvalued(bet);
    }

    let prices: Vec<f64> = siblings.iter().map(|(_, p)| *p).collect();
    let Ok(fair) = fair_odds(&prices, method) else {
        return ValuedBet::unvalued(bet);
    };

    let Some(idx) = siblings.iter().position(|(k, _)| k == &bet.source.outcome) else {
        return ValuedBet::unvalued(bet);
    };
    let fair_odd = fair[idx];
    if fair_odd <= 0.0 {
        return ValuedBet::unvalued(bet);
    }

    ValuedBet {
        market: bet.target.market.clone(),
        selection: bet.target.selection.clone(),
        special_value: bet.target.special_value.clone(),
        target_odds: bet.target.odds,
        fair_probability: 1.0 / fair_odd,
        fair_odds: fair_odd,
        edge: (bet.target.odds / fair_odd - 1.0) * 100.0,
    }
}
