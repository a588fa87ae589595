// 🎚️ Trim - Vehicle grade with an additive price and eligibility sets
//
// Eligibility is wiring, not ownership: a TrimColor/TrimOption row says
// "this trim may be configured with that color/option". Join rows carry
// their own ids so the merger and importer can address them without
// touching the rows they connect. A link must stay inside the trim's
// vehicle; the store enforces that on insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::option::OptionItem;

// ============================================================================
// TRIM ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trim {
    pub id: String,
    pub vehicle_id: String,
    pub name: String,

    /// Additive price on top of the vehicle's base price.
    pub price: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trim {
    pub fn new(vehicle_id: &str, name: &str, price: i64) -> Self {
        let now = Utc::now();
        Trim {
            id: uuid::Uuid::new_v4().to_string(),
            vehicle_id: vehicle_id.to_string(),
            name: name.to_string(),
            price,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// ELIGIBILITY JOIN RECORDS
// ============================================================================

/// Trim → eligible color.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimColor {
    pub id: String,
    pub trim_id: String,
    pub color_id: String,
}

impl TrimColor {
    pub fn new(trim_id: &str, color_id: &str) -> Self {
        TrimColor {
            id: uuid::Uuid::new_v4().to_string(),
            trim_id: trim_id.to_string(),
            color_id: color_id.to_string(),
        }
    }
}

/// Trim → eligible option, with trim-specific pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimOption {
    pub id: String,
    pub trim_id: String,
    pub option_id: String,

    /// Trim-specific price. None means inherit the option's own price;
    /// Some(0) is a real price (free under this trim).
    pub price_override: Option<i64>,

    /// Preselected in the configurator. Selection still prices normally;
    /// deselecting an included option costs nothing.
    pub included: bool,
}

impl TrimOption {
    pub fn new(trim_id: &str, option_id: &str) -> Self {
        TrimOption {
            id: uuid::Uuid::new_v4().to_string(),
            trim_id: trim_id.to_string(),
            option_id: option_id.to_string(),
            price_override: None,
            included: false,
        }
    }

    /// What the option costs when selected under this trim.
    pub fn effective_price(&self, option: &OptionItem) -> i64 {
        self.price_override.unwrap_or(option.price)
    }
}
