//! Static reference-to-bookmaker market mapping configuration.
//!
//! The reference source and the bookmaker do not share a taxonomy: line types,
//! selection labels and handicap numbering all differ. This module compiles
//! the translation tables once, at first use, into an immutable process-wide
//! structure shared by reference across sessions.
//!
//! Line values are keyed by a fixed-point quarter-point representation rather
//! than by their raw strings, so "1.5", "1.50" and "+1.5" all resolve to the
//! same entry and no floating-point key ever has to compare equal.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Whether a line type carries one flat outcome->price map or a family of
/// sub-markets keyed by line value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    MoneyLine,
    ByLine,
}

/// A line value in quarter-point units (−1.25 -> −5, 2.5 -> 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineKey(i32);

impl LineKey {
    /// Parse a raw line-value string. Rejects values that do not sit on a
    /// quarter-point boundary, so a malformed key can never alias another.
    pub fn parse(raw: &str) -> Option<Self> {
        let v: f64 = raw.trim().parse().ok()?;
        if !v.is_finite() {
            return None;
        }
        let quarters = v * 4.0;
        let rounded = quarters.round();
        if (quarters - rounded).abs() > 1e-6 {
            return None;
        }
        Some(LineKey(rounded as i32))
    }

    pub fn from_quarters(q: i32) -> Self {
        LineKey(q)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 4.0
    }

    /// True for split lines (x.25 / x.75) that the bookmaker only quotes on
    /// its Asian Handicap market.
    pub fn is_quarter_line(self) -> bool {
        self.0 % 2 != 0
    }
}

/// Per-line-value override resolving the two systems' numbering mismatch.
#[derive(Debug, Clone)]
pub struct BridgeEntry {
    /// When set, the bookmaker market name must match this label exactly
    /// (case-insensitive) instead of the sport-level prefix.
    pub market_label: Option<String>,
    /// Expected bookmaker special value for this line; compared against the
    /// listing when the market is matched by prefix.
    pub special_value: String,
    /// Selection-label overrides per reference outcome key.
    pub outcomes: HashMap<String, String>,
}

/// Mapping for one (line type, sport) pair.
#[derive(Debug, Clone)]
pub struct LineTypeSpec {
    pub kind: LineKind,
    /// Bookmaker market-name prefix used for matching (case-insensitive).
    pub display_label: String,
    /// Sport-level default: reference outcome key -> bookmaker selection label.
    pub outcomes: HashMap<String, String>,
    /// Per-line overrides for derived/transformed lines.
    pub bridge: HashMap<LineKey, BridgeEntry>,
}

impl LineTypeSpec {
    /// Bridge entry governing a line, if any.
    pub fn bridge_entry(&self, key: LineKey) -> Option<&BridgeEntry> {
        self.bridge.get(&key)
    }
}

pub struct MappingTable {
    specs: HashMap<(String, String), LineTypeSpec>,
}

impl MappingTable {
    pub fn get(&self, line_type: &str, sport_id: &str) -> Option<&LineTypeSpec> {
        self.specs
            .get(&(line_type.to_string(), sport_id.to_string()))
    }
}

/// The process-wide table. Built once, never mutated.
pub fn mapping_table() -> &'static MappingTable {
    static TABLE: Lazy<MappingTable> = Lazy::new(build_table);
    &TABLE
}

fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn build_table() -> MappingTable {
    let mut specs = HashMap::new();

    // Money line. Sport "1" is three-way (soccer style), "2" is two-way.
    specs.insert(
        ("moneyline".to_string(), "1".to_string()),
        LineTypeSpec {
            kind: LineKind::MoneyLine,
            display_label: "Match Result".to_string(),
            outcomes: labels(&[("home", "1"), ("draw", "X"), ("away", "2")]),
            bridge: HashMap::new(),
        },
    );
    specs.insert(
        ("moneyline".to_string(), "2".to_string()),
        LineTypeSpec {
            kind: LineKind::MoneyLine,
            display_label: "Winner".to_string(),
            outcomes: labels(&[("home", "1"), ("away", "2")]),
            bridge: HashMap::new(),
        },
    );

    // Totals: line values pass straight through, both systems quote the
    // same half-point convention.
    for sport in ["1", "2"] {
        specs.insert(
            ("totals".to_string(), sport.to_string()),
            LineTypeSpec {
                kind: LineKind::ByLine,
                display_label: "Total".to_string(),
                outcomes: labels(&[("over", "Over"), ("under", "Under")]),
                bridge: HashMap::new(),
            },
        );
    }

    // Handicaps: the reference quotes a signed line from the home
    // perspective; the bookmaker quotes an unsigned special value with the
    // side carried by the selection label. Quarter ("split") lines only
    // exist on the bookmaker's Asian Handicap market.
    for sport in ["1", "2"] {
        specs.insert(
            ("handicap".to_string(), sport.to_string()),
            LineTypeSpec {
                kind: LineKind::ByLine,
                display_label: "Handicap".to_string(),
                outcomes: labels(&[("home", "Home"), ("away", "Away")]),
                bridge: handicap_bridge(),
            },
        );
    }

    let table = MappingTable { specs };
    validate_table(&table);
    table
}

/// Generated rather than hand-written: one entry per quarter-point line in
/// [-10.0, +10.0].
fn handicap_bridge() -> HashMap<LineKey, BridgeEntry> {
    let mut bridge = HashMap::new();
    for q in -40i32..=40 {
        let key = LineKey::from_quarters(q);
        let line = key.as_f64();
        let entry = if key.is_quarter_line() {
            BridgeEntry {
                market_label: Some("Asian Handicap".to_string()),
                special_value: fmt_line(line),
                outcomes: labels(&[
                    ("home", &format!("Home {}", fmt_signed(line))),
                    ("away", &format!("Away {}", fmt_signed(-line))),
                ]),
            }
        } else {
            BridgeEntry {
                market_label: None,
                special_value: fmt_line(line.abs()),
                outcomes: labels(&[
                    ("home", &format!("Home {}", fmt_signed(line))),
                    ("away", &format!("Away {}", fmt_signed(-line))),
                ]),
            }
        };
        bridge.insert(key, entry);
    }
    bridge
}

fn fmt_line(v: f64) -> String {
    format!("{}", v)
}

fn fmt_signed(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else {
        format!("{:+}", v)
    }
}

/// Every compiled special value must itself parse back to a quarter-point
/// key; a table entry failing this is a programming error, caught at the
/// first table access rather than at match time.
fn validate_table(table: &MappingTable) {
    for ((line_type, sport), spec) in &table.specs {
        for (key, entry) in &spec.bridge {
            let parsed = LineKey::parse(&entry.special_value).unwrap_or_else(|| {
                panic!(
                    "mapping table {}/{}: special value '{}' is not a quarter-point line",
                    line_type, sport, entry.special_value
                )
            });
            assert!(
                parsed.as_f64().abs() == key.as_f64().abs(),
                "mapping table {}/{}: special value '{}' disagrees with key {:?}",
                line_type,
                sport,
                entry.special_value,
                key
            );
        }
    }
}
