// 📇 Master Catalog - Brand-scoped color and option templates
//
// A master is the brand-level identity behind vehicle-scoped entries:
// "Pearl White" exists once per brand, however many vehicles offer it.
// How many vehicles reference a master is always derived by counting
// references at read time (db::master_color_vehicle_count and friends);
// a stored counter would drift the moment a merge rewrites references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// MASTER KIND
// ============================================================================

/// Which master table an operation targets. Merge requests and duplicate
/// listings are parameterized by this instead of duplicating endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasterKind {
    Color,
    Option,
}

impl MasterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasterKind::Color => "color",
            MasterKind::Option => "option",
        }
    }

    pub fn parse(value: &str) -> Option<MasterKind> {
        match value {
            "color" => Some(MasterKind::Color),
            "option" => Some(MasterKind::Option),
            _ => None,
        }
    }

    /// Entity name used in the audit trail.
    pub fn entity_name(&self) -> &'static str {
        match self {
            MasterKind::Color => "master_color",
            MasterKind::Option => "master_option",
        }
    }
}

// ============================================================================
// MASTER ENTITIES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterColor {
    pub id: String,
    pub brand_id: String,
    pub name: String,
    pub hex: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterColor {
    pub fn new(brand_id: &str, name: &str) -> Self {
        let now = Utc::now();
        MasterColor {
            id: uuid::Uuid::new_v4().to_string(),
            brand_id: brand_id.to_string(),
            name: name.to_string(),
            hex: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterOption {
    pub id: String,
    pub brand_id: String,
    pub name: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterOption {
    pub fn new(brand_id: &str, name: &str) -> Self {
        let now = Utc::now();
        MasterOption {
            id: uuid::Uuid::new_v4().to_string(),
            brand_id: brand_id.to_string(),
            name: name.to_string(),
            category: None,
            created_at: now,
            updated_at: now,
        }
    }
}
