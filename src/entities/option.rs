// 🧩 OptionItem - Vehicle-scoped add-on (sunroof, audio package, ...)
//
// Named OptionItem to stay out of std::option's way in imports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: String,
    pub vehicle_id: String,
    pub name: String,

    /// Free-text grouping shown in the configurator ("Comfort", "Safety").
    pub category: Option<String>,

    /// Additive price; a trim may override it per TrimOption link.
    pub price: i64,

    /// Brand master this entry derives from, if any.
    pub master_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OptionItem {
    pub fn new(vehicle_id: &str, name: &str, price: i64) -> Self {
        let now = Utc::now();
        OptionItem {
            id: uuid::Uuid::new_v4().to_string(),
            vehicle_id: vehicle_id.to_string(),
            name: name.to_string(),
            category: None,
            price,
            master_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
