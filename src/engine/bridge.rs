//! Market bridge: translates a reference-source market payload onto the
//! bookmaker's market/selection naming, producing groups of matched bets
//! keyed by normalized market name.
//!
//! The bridge never fails: malformed payload sections are skipped with a log
//! line and an empty mapping is returned in the worst case.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::adapters::types::{ReferencePayload, TargetMarket};
use crate::engine::mappings::{mapping_table, LineKey, LineKind, LineTypeSpec};

/// Period tag carried on every matched bet. Only full-time markets are
/// bridged; period-specific lines are a separate payload feed.
pub const FULL_TIME: &str = "ft";

/// One bookmaker (market, selection) pair matched to one reference outcome.
#[derive(Debug, Clone)]
pub struct MatchedBet {
    pub target: TargetPick,
    pub source: ReferencePick,
}

/// Bookmaker side of a match.
#[derive(Debug, Clone)]
pub struct TargetPick {
    pub market: String,
    pub selection: String,
    pub odds: f64,
    pub special_value: Option<String>,
}

/// Reference side of a match, carrying the full sibling price set so the
/// evaluator can de-vig without re-fetching the payload.
#[derive(Debug, Clone)]
pub struct ReferencePick {
    pub line_type: String,
    pub line_value: Option<String>,
    pub outcome: String,
    pub siblings: Vec<(String, f64)>,
    pub sport_id: String,
    pub period: String,
}

/// Matched bets grouped by lowercased bookmaker market name.
pub type BridgedMarkets = HashMap<String, Vec<MatchedBet>>;

struct FlatSelection<'a> {
    market: &'a str,
    market_lower: String,
    selection: &'a str,
    special_value: Option<&'a str>,
    odds: f64,
}

/// Map the reference payload onto the bookmaker's market list.
pub fn bridge_markets(
    target: &[TargetMarket],
    payload: &ReferencePayload,
    sport_id: &str,
) -> BridgedMarkets {
    let sport_id = if sport_id.is_empty() { "1" } else { sport_id };
    let flat = flatten(target);
    let mut groups: BridgedMarkets = HashMap::new();

    for (line_type, body) in payload {
        let Some(spec) = mapping_table().get(line_type, sport_id) else {
            debug!(
                "No mapping for line type '{}' sport '{}', skipping",
                line_type, sport_id
            );
            continue;
        };
        if body.is_null() {
            continue;
        }
        let Some(obj) = body.as_object() else {
            warn!(
                "Reference payload for '{}' is neither object nor null, skipping",
                line_type
            );
            continue;
        };

        match spec.kind {
            LineKind::MoneyLine => {
                bridge_flat(&flat, spec, line_type, sport_id, obj, &mut groups)
            }
            LineKind::ByLine => {
                bridge_by_line(&flat, spec, line_type, sport_id, obj, &mut groups)
            }
        }
    }

    groups
}

fn flatten(target: &[TargetMarket]) -> Vec<FlatSelection<'_>> {
    let mut flat = Vec::new();
    for market in target {
        for sel in &market.selections {
            flat.push(FlatSelection {
                market: &market.name,
                market_lower: market.name.to_lowercase(),
                selection: &sel.name,
                special_value: market.special_value.as_deref().map(str::trim),
                odds: sel.odds,
            });
        }
    }
    flat
}

/// Money line: one flat outcome->price map, no special value to compare.
fn bridge_flat(
    flat: &[FlatSelection<'_>],
    spec: &LineTypeSpec,
    line_type: &str,
    sport_id: &str,
    obj: &serde_json::Map<String, Value>,
    groups: &mut BridgedMarkets,
) {
    let siblings = numeric_entries(obj);
    let prefix = spec.display_label.to_lowercase();

    for (outcome, _price) in &siblings {
        let Some(label) = spec.outcomes.get(outcome) else {
            continue;
        };
        let hit = flat.iter().find(|f| {
            f.market_lower.starts_with(&prefix) && f.selection.eq_ignore_ascii_case(label)
        });
        if let Some(f) = hit {
            push_match(groups, f, line_type, None, outcome, &siblings, sport_id);
        }
    }
}

/// Sub-keyed line types (totals, handicaps): iterate sub-markets by line
/// value and resolve the expected bookmaker special value and selection
/// labels through the bridge table when one governs the line.
fn bridge_by_line(
    flat: &[FlatSelection<'_>],
    spec: &LineTypeSpec,
    line_type: &str,
    sport_id: &str,
    obj: &serde_json::Map<String, Value>,
    groups: &mut BridgedMarkets,
) {
    let prefix = spec.display_label.to_lowercase();

    for (line_value, sub) in obj {
        if sub.is_null() {
            continue;
        }
        let Some(sub_obj) = sub.as_object() else {
            continue;
        };
        let siblings = numeric_entries(sub_obj);
        if siblings.is_empty() {
            continue;
        }
        let Some(key) = LineKey::parse(line_value) else {
            debug!(
                "Unparseable line value '{}' for '{}', skipping",
                line_value, line_type
            );
            continue;
        };
        let entry = spec.bridge_entry(key);

        for (outcome, _price) in &siblings {
            let label = entry
                .and_then(|e| e.outcomes.get(outcome))
                .or_else(|| spec.outcomes.get(outcome));
            let Some(label) = label else { continue };

            let hit = flat.iter().find(|f| {
                let name_ok = match entry.and_then(|e| e.market_label.as_deref()) {
                    Some(exact) => f.market.eq_ignore_ascii_case(exact),
                    None => f.market_lower.starts_with(&prefix),
                };
                if !name_ok || !f.selection.eq_ignore_ascii_case(label) {
                    return false;
                }
                match entry {
                    // A bridge entry pinning an exact label also owns the
                    // line encoding, so the special value is not compared.
                    Some(e) if e.market_label.is_some() => true,
                    // Prefix-matched bridged line: the bookmaker's special
                    // value must agree with the entry's compiled one.
                    Some(e) => f.special_value == Some(e.special_value.as_str()),
                    // No bridge entry: the raw line value must agree with
                    // the bookmaker's special value exactly.
                    None => f.special_value == Some(line_value.trim()),
                }
            });
            if let Some(f) = hit {
                push_match(
                    groups,
                    f,
                    line_type,
                    Some(line_value.as_str()),
                    outcome,
                    &siblings,
                    sport_id,
                );
            }
        }
    }
}

fn push_match(
    groups: &mut BridgedMarkets,
    f: &FlatSelection<'_>,
    line_type: &str,
    line_value: Option<&str>,
    outcome: &str,
    siblings: &[(String, f64)],
    sport_id: &str,
) {
    groups
        .entry(f.market_lower.clone())
        .or_default()
        .push(MatchedBet {
            target: TargetPick {
                market: f.market.to_string(),
                selection: f.selection.to_string(),
                odds: f.odds,
                special_value: f.special_value.map(str::to_string),
            },
            source: ReferencePick {
                line_type: line_type.to_string(),
                line_value: line_value.map(str::to_string),
                outcome: outcome.to_string(),
                siblings: siblings.to_vec(),
                sport_id: sport_id.to_string(),
                period: FULL_TIME.to_string(),
            },
        });
}

/// Extract the numeric outcome->price entries of a payload object, dropping
/// metadata keys and unparseable prices.
fn numeric_entries(obj: &serde_json::Map<String, Value>) -> Vec<(String, f64)> {
    obj.iter()
        .filter_map(|(k, v)| price_of(v).map(|p| (k.clone(), p)))
        .collect()
}

fn price_of(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
