// 📥 Import Reconciler - copy colors, options and trims between vehicles
//
// Pulls the selected categories from a list of source vehicles into a
// destination vehicle in one transaction. Dedup is cumulative: an item is
// skipped when the destination already has one of the same name (colors:
// same kind too, compared case-insensitively), or when an earlier source
// in the batch already introduced it. Earlier sources win ties.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db;
use crate::entities::{Color, ColorKind, OptionItem, Trim};
use crate::error::{CatalogError, Result};

/// How many skipped names a section report lists before truncating.
pub const SKIPPED_NAME_PREVIEW: usize = 10;

// ===== REQUEST / REPORT =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub destination_id: String,
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub colors: bool,
    #[serde(default)]
    pub options: bool,
    #[serde(default)]
    pub trims: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionReport {
    pub imported: usize,
    pub skipped: usize,
    /// First [`SKIPPED_NAME_PREVIEW`] skipped names, for operator review.
    pub skipped_names: Vec<String>,
}

impl SectionReport {
    fn skip(&mut self, name: &str) {
        self.skipped += 1;
        if self.skipped_names.len() < SKIPPED_NAME_PREVIEW {
            self.skipped_names.push(name.to_string());
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub destination_id: String,
    /// Sources actually visited, in request order with repeats removed.
    pub source_ids: Vec<String>,
    pub colors: SectionReport,
    pub options: SectionReport,
    pub trims: SectionReport,
}

impl ImportReport {
    pub fn total_imported(&self) -> usize {
        self.colors.imported + self.options.imported + self.trims.imported
    }

    pub fn total_skipped(&self) -> usize {
        self.colors.skipped + self.options.skipped + self.trims.skipped
    }

    pub fn summary(&self) -> String {
        format!(
            "imported {} color(s), {} option(s), {} trim(s) into '{}', {} duplicate(s) skipped",
            self.colors.imported,
            self.options.imported,
            self.trims.imported,
            self.destination_id,
            self.total_skipped()
        )
    }
}

// ===== IMPORT =====

/// Import the selected categories from source vehicles into the destination.
///
/// The whole batch commits or rolls back as one unit; any unknown vehicle id
/// aborts with [`CatalogError::NotFound`] and leaves the destination as it was.
pub fn import_from(conn: &mut Connection, request: &ImportRequest) -> Result<ImportReport> {
    if !request.colors && !request.options && !request.trims {
        return Err(CatalogError::InvalidRequest(
            "select at least one of colors, options or trims to import".to_string(),
        ));
    }
    if request.source_ids.is_empty() {
        return Err(CatalogError::InvalidRequest(
            "import needs at least one source vehicle".to_string(),
        ));
    }
    if request.source_ids.iter().any(|id| id == &request.destination_id) {
        return Err(CatalogError::InvalidRequest(
            "a vehicle cannot import from itself".to_string(),
        ));
    }

    let tx = conn.transaction()?;

    let destination = db::get_vehicle(&tx, &request.destination_id)?;

    // request order decides who wins ties; a repeated id is visited once
    let mut sources = Vec::new();
    let mut seen_sources = HashSet::new();
    for source_id in &request.source_ids {
        if seen_sources.insert(source_id.clone()) {
            sources.push(db::get_vehicle(&tx, source_id)?);
        }
    }

    let mut report = ImportReport {
        destination_id: destination.id.clone(),
        source_ids: sources.iter().map(|v| v.id.clone()).collect(),
        colors: SectionReport::default(),
        options: SectionReport::default(),
        trims: SectionReport::default(),
    };

    let mut seen_colors: HashSet<(ColorKind, String)> =
        db::list_colors_for_vehicle(&tx, &destination.id)?
            .iter()
            .map(|c| (c.kind, c.name.to_lowercase()))
            .collect();
    let mut seen_options: HashSet<String> = db::list_options_for_vehicle(&tx, &destination.id)?
        .iter()
        .map(|o| o.name.to_lowercase())
        .collect();
    let mut seen_trims: HashSet<String> = db::list_trims_for_vehicle(&tx, &destination.id)?
        .iter()
        .map(|t| t.name.to_lowercase())
        .collect();

    for source in &sources {
        // master references only carry over inside one brand's namespace
        let same_brand = source.brand_id == destination.brand_id;

        if request.colors {
            for color in db::list_colors_for_vehicle(&tx, &source.id)? {
                let key = (color.kind, color.name.to_lowercase());
                if !seen_colors.insert(key) {
                    report.colors.skip(&color.name);
                    continue;
                }
                let mut clone = Color::new(&destination.id, color.kind, &color.name, color.price);
                clone.hex = color.hex.clone();
                if same_brand {
                    clone.master_id = color.master_id.clone();
                }
                db::insert_color(&tx, &clone)?;
                report.colors.imported += 1;
            }
        }

        if request.options {
            for option in db::list_options_for_vehicle(&tx, &source.id)? {
                let key = option.name.to_lowercase();
                if !seen_options.insert(key) {
                    report.options.skip(&option.name);
                    continue;
                }
                let mut clone = OptionItem::new(&destination.id, &option.name, option.price);
                clone.category = option.category.clone();
                if same_brand {
                    clone.master_id = option.master_id.clone();
                }
                db::insert_option(&tx, &clone)?;
                report.options.imported += 1;
            }
        }

        if request.trims {
            for trim in db::list_trims_for_vehicle(&tx, &source.id)? {
                let key = trim.name.to_lowercase();
                if !seen_trims.insert(key) {
                    report.trims.skip(&trim.name);
                    continue;
                }
                // eligibility joins point at source-vehicle rows, so they stay behind
                let clone = Trim::new(&destination.id, &trim.name, trim.price);
                db::insert_trim(&tx, &clone)?;
                report.trims.imported += 1;
            }
        }
    }

    let event = db::Event::new(
        "catalog_imported",
        "vehicle",
        &destination.id,
        serde_json::json!({
            "sources": report.source_ids,
            "colors": report.colors.imported,
            "options": report.options.imported,
            "trims": report.trims.imported,
            "skipped": report.total_skipped(),
        }),
        "catalog_admin",
    );
    db::insert_event(&tx, &event)?;

    tx.commit()?;

    Ok(report)
}

// ===== TESTS =====
