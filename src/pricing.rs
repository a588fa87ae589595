// 💰 Price Matrix - Sparse (period, deposit-ratio) → monthly payment table
//
// The business rule is "exact match or ask a human": a lookup either hits
// a positive cell or comes back Unavailable. Never interpolate across
// periods or ratios.
//
// Cells travel as rentPrice{period}_{ratio} JSON fields (rentPrice60_0,
// rentPrice48_30, ...) flattened into the vehicle document. Periods are a
// fixed choice set; deposit-ratio sets vary per vehicle and are never
// hard-coded — queries consult whatever cells exist.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Contract periods offered on every rate sheet, in months.
pub const SUPPORTED_PERIODS: [u32; 4] = [24, 36, 48, 60];

/// Prefix of every flattened matrix cell field.
const CELL_PREFIX: &str = "rentPrice";

// ============================================================================
// RATE QUOTE
// ============================================================================

/// Outcome of a rate lookup. `Unavailable` is data, not an error: the
/// storefront renders it as "monthly rate on consultation".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateQuote {
    Monthly(i64),
    Unavailable,
}

impl RateQuote {
    pub fn monthly(&self) -> Option<i64> {
        match self {
            RateQuote::Monthly(amount) => Some(*amount),
            RateQuote::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RateQuote::Monthly(_))
    }
}

// ============================================================================
// CELL KEY CODEC
// ============================================================================

/// Format a matrix cell as its wire field name.
///
/// ```
/// use lease_catalog::pricing::cell_key;
/// assert_eq!(cell_key(60, 0), "rentPrice60_0");
/// assert_eq!(cell_key(48, 30), "rentPrice48_30");
/// ```
pub fn cell_key(period: u32, ratio: u32) -> String {
    format!("{}{}_{}", CELL_PREFIX, period, ratio)
}

/// Parse a wire field name back into (period, ratio). Anything that is
/// not a well-formed cell key returns None, so callers can walk a mixed
/// set of JSON/sheet fields and pick out the matrix cells.
pub fn parse_cell_key(key: &str) -> Option<(u32, u32)> {
    let rest = key.strip_prefix(CELL_PREFIX)?;
    let (period, ratio) = rest.split_once('_')?;
    Some((period.parse().ok()?, ratio.parse().ok()?))
}

// ============================================================================
// PRICE MATRIX
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceMatrix {
    /// Raw cells keyed by (period months, deposit ratio percent).
    /// Stored as loaded; every query treats non-positive values as absent.
    cells: BTreeMap<(u32, u32), i64>,
}

impl PriceMatrix {
    pub fn new() -> Self {
        PriceMatrix {
            cells: BTreeMap::new(),
        }
    }

    /// Set a cell to a raw value. Non-positive values are kept (the admin
    /// sheet may carry 0 placeholders) but never resolve.
    pub fn set(&mut self, period: u32, ratio: u32, amount: i64) {
        self.cells.insert((period, ratio), amount);
    }

    /// Raw cell value, including non-positive placeholders.
    pub fn cell(&self, period: u32, ratio: u32) -> Option<i64> {
        self.cells.get(&(period, ratio)).copied()
    }

    /// Exact lookup of the (period, ratio) cell.
    pub fn resolve(&self, period: u32, ratio: u32) -> RateQuote {
        match self.cells.get(&(period, ratio)) {
            Some(&amount) if amount > 0 => RateQuote::Monthly(amount),
            _ => RateQuote::Unavailable,
        }
    }

    /// Deposit ratios that actually price under the given period,
    /// ascending. Used to disable unavailable choices in the UI.
    pub fn available_deposit_ratios(&self, period: u32) -> Vec<u32> {
        self.cells
            .iter()
            .filter(|&(&(p, _), &amount)| p == period && amount > 0)
            .map(|(&(_, ratio), _)| ratio)
            .collect()
    }

    /// True when at least one deposit ratio prices under this period.
    pub fn is_period_usable(&self, period: u32) -> bool {
        self.cells
            .iter()
            .any(|(&(p, _), &amount)| p == period && amount > 0)
    }

    /// The supported periods that have at least one priced ratio.
    pub fn usable_periods(&self) -> Vec<u32> {
        SUPPORTED_PERIODS
            .iter()
            .copied()
            .filter(|&period| self.is_period_usable(period))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// All raw cells as (period, ratio, amount), ordered by period then ratio.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, i64)> + '_ {
        self.cells.iter().map(|(&(p, r), &amount)| (p, r, amount))
    }
}

// ============================================================================
// SERDE - flatten-compatible rentPrice{P}_{D} wire shape
// ============================================================================

impl Serialize for PriceMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (&(period, ratio), amount) in &self.cells {
            map.serialize_entry(&cell_key(period, ratio), amount)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PriceMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CellVisitor;

        impl<'de> Visitor<'de> for CellVisitor {
            type Value = PriceMatrix;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map with rentPrice{period}_{ratio} fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PriceMatrix, A::Error> {
                let mut matrix = PriceMatrix::new();
                while let Some(key) = access.next_key::<String>()? {
                    match parse_cell_key(&key) {
                        Some((period, ratio)) => {
                            // Sheets and legacy documents deliver cells as
                            // numbers or numeric strings; anything else is
                            // treated as an absent cell.
                            let value = access.next_value::<serde_json::Value>()?;
                            if let Some(amount) = value_as_amount(&value) {
                                matrix.set(period, ratio, amount);
                            }
                        }
                        None => {
                            let _ = access.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(matrix)
            }
        }

        deserializer.deserialize_map(CellVisitor)
    }
}

fn value_as_amount(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
