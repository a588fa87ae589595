// Catalog Entity Models
// Identity is a UUID string; values (names, prices, wiring) change over time.
//
// Two scopes:
// - Vehicle-scoped records (Trim, Color, OptionItem) belong to exactly one
//   Vehicle and carry their own prices.
// - Master records (MasterColor, MasterOption) are brand-scoped templates
//   that vehicle-scoped rows may reference; their vehicle counts are
//   derived on read, never stored.

pub mod brand;
pub mod color;
pub mod master;
pub mod option;
pub mod trim;
pub mod vehicle;

pub use brand::Brand;
pub use color::{Color, ColorKind};
pub use master::{MasterColor, MasterKind, MasterOption};
pub use option::OptionItem;
pub use trim::{Trim, TrimColor, TrimOption};
pub use vehicle::Vehicle;
