// 🚗 Vehicle - Leasable model with a base price and a sparse rate matrix
//
// The rate matrix is flattened into the vehicle's JSON document as
// rentPrice{period}_{ratio} fields (rentPrice60_0, rentPrice48_30, ...),
// the shape the admin sheets and the quote page already speak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::PriceMatrix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub brand_id: String,
    pub name: String,

    /// Lease price before trim/color/option additions.
    pub base_price: i64,

    /// Sparse (period, deposit-ratio) → monthly payment table.
    /// Missing or non-positive cells mean "no price; quote on request".
    #[serde(flatten)]
    pub rates: PriceMatrix,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(brand_id: &str, name: &str, base_price: i64) -> Self {
        let now = Utc::now();
        Vehicle {
            id: uuid::Uuid::new_v4().to_string(),
            brand_id: brand_id.to_string(),
            name: name.to_string(),
            base_price,
            rates: PriceMatrix::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
