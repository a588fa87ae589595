// 🎨 Color - Vehicle-scoped paint or upholstery entry
//
// A color belongs to one vehicle and carries its own additive price.
// It may reference a brand-scoped MasterColor template; the reference is
// what CatalogMerger rewrites, the row itself never moves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// COLOR KIND
// ============================================================================

/// Exterior paint vs interior upholstery. The two kinds are separate
/// namespaces: "Black" can exist once per kind on the same vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColorKind {
    Exterior,
    Interior,
}

impl ColorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorKind::Exterior => "EXTERIOR",
            ColorKind::Interior => "INTERIOR",
        }
    }

    pub fn parse(value: &str) -> Option<ColorKind> {
        match value {
            "EXTERIOR" => Some(ColorKind::Exterior),
            "INTERIOR" => Some(ColorKind::Interior),
            _ => None,
        }
    }
}

// ============================================================================
// COLOR ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Color {
    pub id: String,
    pub vehicle_id: String,
    pub kind: ColorKind,
    pub name: String,

    /// Display swatch, "#RRGGBB". Interior fabrics often have none.
    pub hex: Option<String>,

    /// Additive price on top of the vehicle's base price.
    pub price: i64,

    /// Brand master this entry derives from, if any.
    pub master_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Color {
    pub fn new(vehicle_id: &str, kind: ColorKind, name: &str, price: i64) -> Self {
        let now = Utc::now();
        Color {
            id: uuid::Uuid::new_v4().to_string(),
            vehicle_id: vehicle_id.to_string(),
            kind,
            name: name.to_string(),
            hex: None,
            price,
            master_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_kind_round_trip() {
        assert_eq!(ColorKind::Exterior.as_str(), "EXTERIOR");
        assert_eq!(ColorKind::parse("INTERIOR"), Some(ColorKind::Interior));
        assert_eq!(ColorKind::parse("interior"), None);
        assert_eq!(ColorKind::parse(""), None);
    }

    #[test]
    fn test_color_kind_serde_uses_wire_names() {
        let json = serde_json::to_string(&ColorKind::Exterior).unwrap();
        assert_eq!(json, "\"EXTERIOR\"");

        let parsed: ColorKind = serde_json::from_str("\"INTERIOR\"").unwrap();
        assert_eq!(parsed, ColorKind::Interior);
    }

    #[test]
    fn test_color_creation() {
        let color = Color::new("vehicle-1", ColorKind::Exterior, "Pearl White", 300_000);

        assert!(!color.id.is_empty());
        assert_eq!(color.kind, ColorKind::Exterior);
        assert_eq!(color.price, 300_000);
        assert!(color.hex.is_none());
        assert!(color.master_id.is_none());
    }
}
