// 🔀 Master Merge - collapse duplicate master records into one survivor
//
// Re-points every vehicle-level reference from the source masters to the
// target, deletes the sources, and records the merge in the audit trail,
// all inside a single transaction. Vehicle-level rows keep their own name,
// price and trim eligibility; only the master reference moves.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::entities::MasterKind;
use crate::error::{CatalogError, Result};

// ===== REQUEST / OUTCOME =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub kind: MasterKind,
    pub target_id: String,
    pub source_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub kind: MasterKind,
    pub target_id: String,
    pub merged_source_ids: Vec<String>,
    /// Vehicle-level colors or options whose master reference moved.
    pub relinked_items: usize,
    /// Distinct vehicles referencing the target after the merge.
    pub target_vehicle_count: i64,
}

impl MergeOutcome {
    pub fn summary(&self) -> String {
        format!(
            "merged {} {} master(s) into '{}': {} item(s) relinked, {} vehicle(s) covered",
            self.merged_source_ids.len(),
            self.kind.as_str(),
            self.target_id,
            self.relinked_items,
            self.target_vehicle_count
        )
    }
}

// ===== MERGE =====

/// Merge source masters into the target master of the same brand.
///
/// Duplicate source ids are collapsed before validation. The whole operation
/// commits or rolls back as one unit; a target or source that no longer
/// exists surfaces as [`CatalogError::MergeConflict`].
pub fn merge_masters(conn: &mut Connection, request: &MergeRequest) -> Result<MergeOutcome> {
    let mut source_ids = request.source_ids.clone();
    source_ids.sort();
    source_ids.dedup();

    if source_ids.is_empty() {
        return Err(CatalogError::InvalidRequest(
            "merge needs at least one source id".to_string(),
        ));
    }
    if source_ids.iter().any(|id| id == &request.target_id) {
        return Err(CatalogError::InvalidRequest(
            "merge target cannot also be a source".to_string(),
        ));
    }

    let tx = conn.transaction()?;

    let target_brand = master_brand(&tx, request.kind, &request.target_id)?.ok_or_else(|| {
        CatalogError::MergeConflict(format!(
            "merge target '{}' no longer exists",
            request.target_id
        ))
    })?;

    for source_id in &source_ids {
        let brand = master_brand(&tx, request.kind, source_id)?.ok_or_else(|| {
            CatalogError::MergeConflict(format!("merge source '{}' no longer exists", source_id))
        })?;
        if brand != target_brand {
            return Err(CatalogError::InvalidRequest(format!(
                "merge source '{}' belongs to another brand",
                source_id
            )));
        }
    }

    let relinked_items = relink_references(&tx, request.kind, &request.target_id, &source_ids)?;

    let deleted = delete_masters(&tx, request.kind, &source_ids)?;
    if deleted != source_ids.len() {
        return Err(CatalogError::MergeConflict(format!(
            "expected to remove {} master(s), removed {}",
            source_ids.len(),
            deleted
        )));
    }

    let target_vehicle_count = match request.kind {
        MasterKind::Color => db::master_color_vehicle_count(&tx, &request.target_id)?,
        MasterKind::Option => db::master_option_vehicle_count(&tx, &request.target_id)?,
    };

    let event = db::Event::new(
        "masters_merged",
        request.kind.entity_name(),
        &request.target_id,
        serde_json::json!({
            "sources": source_ids,
            "relinked": relinked_items,
            "vehicle_count": target_vehicle_count,
        }),
        "catalog_admin",
    );
    db::insert_event(&tx, &event)?;

    tx.commit()?;

    Ok(MergeOutcome {
        kind: request.kind,
        target_id: request.target_id.clone(),
        merged_source_ids: source_ids,
        relinked_items,
        target_vehicle_count,
    })
}

// ===== HELPERS =====

/// Brand of a master record, or None when it does not exist.
fn master_brand(conn: &Connection, kind: MasterKind, id: &str) -> Result<Option<String>> {
    let loaded = match kind {
        MasterKind::Color => db::get_master_color(conn, id).map(|m| m.brand_id),
        MasterKind::Option => db::get_master_option(conn, id).map(|m| m.brand_id),
    };
    match loaded {
        Ok(brand_id) => Ok(Some(brand_id)),
        Err(CatalogError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

fn numbered_placeholders(start: usize, count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", start + i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn relink_references(
    conn: &Connection,
    kind: MasterKind,
    target_id: &str,
    source_ids: &[String],
) -> Result<usize> {
    let table = match kind {
        MasterKind::Color => "colors",
        MasterKind::Option => "options",
    };
    let sql = format!(
        "UPDATE {} SET master_id = ?1, updated_at = ?2 WHERE master_id IN ({})",
        table,
        numbered_placeholders(3, source_ids.len())
    );

    let mut bindings: Vec<String> = Vec::with_capacity(source_ids.len() + 2);
    bindings.push(target_id.to_string());
    bindings.push(Utc::now().to_rfc3339());
    bindings.extend(source_ids.iter().cloned());

    let relinked = conn.execute(&sql, rusqlite::params_from_iter(bindings))?;
    Ok(relinked)
}

fn delete_masters(conn: &Connection, kind: MasterKind, source_ids: &[String]) -> Result<usize> {
    let table = match kind {
        MasterKind::Color => "master_colors",
        MasterKind::Option => "master_options",
    };
    let sql = format!(
        "DELETE FROM {} WHERE id IN ({})",
        table,
        numbered_placeholders(1, source_ids.len())
    );
    let deleted = conn.execute(&sql, rusqlite::params_from_iter(source_ids.iter()))?;
    Ok(deleted)
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        get_color, get_master_color, insert_brand, insert_color, insert_master_color,
        insert_master_option, insert_option, insert_trim, insert_vehicle, link_trim_color,
        list_master_colors, setup_catalog, trim_color_links,
    };
    use crate::entities::{
        Brand, Color, ColorKind, MasterColor, MasterOption, OptionItem, Trim, Vehicle,
    };

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_catalog(&conn).unwrap();
        conn
    }

    fn seed_brand(conn: &Connection) -> Brand {
        let brand = Brand::new("Hyundai");
        insert_brand(conn, &brand).unwrap();
        brand
    }

    /// Vehicle with one exterior color referencing the given master.
    fn seed_vehicle_with_color(
        conn: &Connection,
        brand_id: &str,
        vehicle_name: &str,
        color_name: &str,
        color_price: i64,
        master_id: &str,
    ) -> (Vehicle, Color) {
        let vehicle = Vehicle::new(brand_id, vehicle_name, 30_000_000);
        insert_vehicle(conn, &vehicle).unwrap();
        let mut color = Color::new(&vehicle.id, ColorKind::Exterior, color_name, color_price);
        color.master_id = Some(master_id.to_string());
        insert_color(conn, &color).unwrap();
        (vehicle, color)
    }

    fn color_request(target: &MasterColor, sources: &[&MasterColor]) -> MergeRequest {
        MergeRequest {
            kind: MasterKind::Color,
            target_id: target.id.clone(),
            source_ids: sources.iter().map(|m| m.id.clone()).collect(),
        }
    }

    #[test]
    fn test_merge_reassigns_references_and_counts_vehicles() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);

        let target = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();
        let duplicate = MasterColor::new(&brand.id, "PearlWhite");
        insert_master_color(&conn, &duplicate).unwrap();

        for name in ["Tucson", "Avante", "Sonata"] {
            seed_vehicle_with_color(&conn, &brand.id, name, "Pearl White", 0, &target.id);
        }
        let (vehicle, color) =
            seed_vehicle_with_color(&conn, &brand.id, "Kona", "PearlWhite", 200_000, &duplicate.id);
        let trim = Trim::new(&vehicle.id, "Premium", 1_000_000);
        insert_trim(&conn, &trim).unwrap();
        link_trim_color(&conn, &trim.id, &color.id).unwrap();

        let outcome =
            merge_masters(&mut conn, &color_request(&target, &[&duplicate])).unwrap();
        assert_eq!(outcome.relinked_items, 1);
        assert_eq!(outcome.target_vehicle_count, 4);

        // duplicate is gone, only the target remains
        assert!(get_master_color(&conn, &duplicate.id).is_err());
        assert_eq!(list_master_colors(&conn, &brand.id).unwrap().len(), 1);

        // the reassigned color kept its own price and eligibility
        let reassigned = get_color(&conn, &color.id).unwrap();
        assert_eq!(reassigned.master_id.as_deref(), Some(target.id.as_str()));
        assert_eq!(reassigned.price, 200_000);
        assert_eq!(reassigned.name, "PearlWhite");
        assert_eq!(trim_color_links(&conn, &trim.id).unwrap().len(), 1);
    }

    #[test]
    fn test_merge_empty_sources_rejected() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);
        let target = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();

        let err = merge_masters(&mut conn, &color_request(&target, &[])).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRequest(_)));
    }

    #[test]
    fn test_merge_target_in_sources_rejected() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);
        let target = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();

        let err = merge_masters(&mut conn, &color_request(&target, &[&target])).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRequest(_)));
        // target untouched
        get_master_color(&conn, &target.id).unwrap();
    }

    #[test]
    fn test_merge_missing_target_is_conflict() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);
        let source = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &source).unwrap();

        let request = MergeRequest {
            kind: MasterKind::Color,
            target_id: "vanished".to_string(),
            source_ids: vec![source.id.clone()],
        };
        let err = merge_masters(&mut conn, &request).unwrap_err();
        assert!(matches!(err, CatalogError::MergeConflict(_)));
    }

    #[test]
    fn test_merge_missing_source_is_conflict_and_rolls_back() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);
        let target = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();
        let real_source = MasterColor::new(&brand.id, "PearlWhite");
        insert_master_color(&conn, &real_source).unwrap();
        let (_, color) =
            seed_vehicle_with_color(&conn, &brand.id, "Kona", "PearlWhite", 0, &real_source.id);

        let request = MergeRequest {
            kind: MasterKind::Color,
            target_id: target.id.clone(),
            source_ids: vec![real_source.id.clone(), "vanished".to_string()],
        };
        let err = merge_masters(&mut conn, &request).unwrap_err();
        assert!(matches!(err, CatalogError::MergeConflict(_)));

        // nothing moved
        get_master_color(&conn, &real_source.id).unwrap();
        let untouched = get_color(&conn, &color.id).unwrap();
        assert_eq!(untouched.master_id.as_deref(), Some(real_source.id.as_str()));
    }

    #[test]
    fn test_merge_cross_brand_source_rejected() {
        let mut conn = test_conn();
        let hyundai = seed_brand(&conn);
        let kia = Brand::new("Kia");
        insert_brand(&conn, &kia).unwrap();

        let target = MasterColor::new(&hyundai.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();
        let foreign = MasterColor::new(&kia.id, "Snow White Pearl");
        insert_master_color(&conn, &foreign).unwrap();

        let err = merge_masters(&mut conn, &color_request(&target, &[&foreign])).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRequest(_)));
        get_master_color(&conn, &foreign.id).unwrap();
    }

    #[test]
    fn test_merge_duplicate_source_ids_collapse() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);
        let target = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();
        let duplicate = MasterColor::new(&brand.id, "PearlWhite");
        insert_master_color(&conn, &duplicate).unwrap();

        let outcome =
            merge_masters(&mut conn, &color_request(&target, &[&duplicate, &duplicate])).unwrap();
        assert_eq!(outcome.merged_source_ids.len(), 1);
    }

    #[test]
    fn test_sequential_merges_compose() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);

        let survivor = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &survivor).unwrap();
        seed_vehicle_with_color(&conn, &brand.id, "Tucson", "Pearl White", 0, &survivor.id);

        let mut duplicates = Vec::new();
        for (vehicle_name, master_name) in [
            ("Avante", "Pearl-White"),
            ("Sonata", "pearl white"),
            ("Kona", "PearlWhite"),
        ] {
            let master = MasterColor::new(&brand.id, master_name);
            insert_master_color(&conn, &master).unwrap();
            seed_vehicle_with_color(&conn, &brand.id, vehicle_name, master_name, 0, &master.id);
            duplicates.push(master);
        }

        let first = merge_masters(
            &mut conn,
            &color_request(&survivor, &[&duplicates[0], &duplicates[1]]),
        )
        .unwrap();
        assert_eq!(first.target_vehicle_count, 3);

        let second =
            merge_masters(&mut conn, &color_request(&survivor, &[&duplicates[2]])).unwrap();
        assert_eq!(second.target_vehicle_count, 4);

        assert_eq!(list_master_colors(&conn, &brand.id).unwrap().len(), 1);
    }

    #[test]
    fn test_merge_option_masters() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);

        let target = MasterOption::new(&brand.id, "Sunroof");
        insert_master_option(&conn, &target).unwrap();
        let duplicate = MasterOption::new(&brand.id, "Sun Roof");
        insert_master_option(&conn, &duplicate).unwrap();

        let vehicle = Vehicle::new(&brand.id, "Tucson", 30_000_000);
        insert_vehicle(&conn, &vehicle).unwrap();
        let mut option = OptionItem::new(&vehicle.id, "Sun Roof", 500_000);
        option.master_id = Some(duplicate.id.clone());
        insert_option(&conn, &option).unwrap();

        let request = MergeRequest {
            kind: MasterKind::Option,
            target_id: target.id.clone(),
            source_ids: vec![duplicate.id.clone()],
        };
        let outcome = merge_masters(&mut conn, &request).unwrap();
        assert_eq!(outcome.relinked_items, 1);
        assert_eq!(outcome.target_vehicle_count, 1);

        let relinked = crate::db::get_option(&conn, &option.id).unwrap();
        assert_eq!(relinked.master_id.as_deref(), Some(target.id.as_str()));
        assert_eq!(relinked.price, 500_000);
    }

    #[test]
    fn test_merge_leaves_catalog_clean() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);

        let target = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();
        let duplicate = MasterColor::new(&brand.id, "Pearl White ");
        insert_master_color(&conn, &duplicate).unwrap();
        seed_vehicle_with_color(&conn, &brand.id, "Tucson", "Pearl White", 0, &target.id);
        seed_vehicle_with_color(&conn, &brand.id, "Kona", "Snow Pearl", 0, &duplicate.id);

        merge_masters(&mut conn, &color_request(&target, &[&duplicate])).unwrap();

        // no vehicle row may still point at the deleted source
        let report = crate::integrity::audit_catalog(&conn).unwrap();
        assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn test_merge_writes_audit_event() {
        let mut conn = test_conn();
        let brand = seed_brand(&conn);
        let target = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(&conn, &target).unwrap();
        let duplicate = MasterColor::new(&brand.id, "PearlWhite");
        insert_master_color(&conn, &duplicate).unwrap();
        seed_vehicle_with_color(&conn, &brand.id, "Kona", "PearlWhite", 0, &duplicate.id);

        merge_masters(&mut conn, &color_request(&target, &[&duplicate])).unwrap();

        let events = db::get_events_for_entity(&conn, "master_color", &target.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "masters_merged");
        assert_eq!(events[0].payload["relinked"], 1);
        assert_eq!(events[0].payload["sources"][0], duplicate.id.as_str());
    }
}
