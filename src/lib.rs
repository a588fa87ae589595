// Lease Catalog Engine - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod entities;
pub mod error;
pub mod import;
pub mod integrity;
pub mod merge;
pub mod pricing;
pub mod quote;
pub mod similarity;

// Re-export commonly used types
pub use db::{
    delete_color, delete_master_color, delete_master_option, delete_option, delete_trim,
    ensure_master_color, ensure_master_option, get_brand, get_color, get_events_for_entity,
    get_master_color, get_master_option, get_option, get_trim, get_vehicle, insert_brand,
    insert_color, insert_event, insert_master_color, insert_master_option, insert_option,
    insert_trim, insert_vehicle, insert_vehicle_sheet, link_trim_color, link_trim_option,
    list_brands, list_colors_for_vehicle, list_master_colors, list_master_options,
    list_options_for_vehicle, list_trims_for_vehicle, list_vehicles_for_brand,
    load_vehicle_sheet, load_vehicle_sheet_from_reader, master_color_vehicle_count,
    master_option_vehicle_count, set_color_master, set_option_master, setup_catalog,
    trim_color_links, trim_option_links, unlink_trim_color, unlink_trim_option,
    update_vehicle_rates, Event, SheetVehicle,
};
pub use entities::{
    Brand, Color, ColorKind, MasterColor, MasterKind, MasterOption, OptionItem, Trim, TrimColor,
    TrimOption, Vehicle,
};
pub use error::{CatalogError, Result};
pub use import::{import_from, ImportReport, ImportRequest, SectionReport};
pub use integrity::{audit_catalog, IntegrityIssue, IntegrityReport, Severity};
pub use merge::{merge_masters, MergeOutcome, MergeRequest};
pub use pricing::{cell_key, parse_cell_key, PriceMatrix, RateQuote, SUPPORTED_PERIODS};
pub use quote::{
    build_quote, quote_vehicle, PriceBreakdown, QuoteInput, QuoteRequest, TrimSelection,
};
pub use similarity::{MatchRule, SimilarPair, SimilarityCandidate, SimilarityDetector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
