// 🔎 Integrity Auditor - verify the referential rules the engine promises
//
// The schema carries no UNIQUE or FOREIGN KEY constraints for engine
// invariants; the store enforces them in code. Databases edited by hand or
// written by older tooling can still drift, so the auditor re-checks every
// rule and reports findings by severity.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

// ===== REPORT TYPES =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // an engine-enforced rule is broken
    Warning,  // suspicious data an operator should review
    Info,     // observation only
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub severity: Severity,
    pub entity: String,
    pub entity_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == Severity::Critical)
    }

    pub fn count_by(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Integrity: {} issue(s) ({} critical, {} warning)",
            self.issues.len(),
            self.count_by(Severity::Critical),
            self.count_by(Severity::Warning)
        )
    }
}

// ===== AUDIT =====

/// Run every integrity check against the catalog.
pub fn audit_catalog(conn: &Connection) -> Result<IntegrityReport> {
    let mut issues = Vec::new();

    check_master_references(conn, &mut issues)?;
    check_brand_references(conn, &mut issues)?;
    check_vehicle_references(conn, &mut issues)?;
    check_eligibility_rows(conn, &mut issues)?;
    check_cross_brand_masters(conn, &mut issues)?;
    check_duplicate_names(conn, &mut issues)?;
    check_blank_names(conn, &mut issues)?;

    Ok(IntegrityReport {
        checked_at: Utc::now(),
        issues,
    })
}

// ===== CHECKS =====

/// Colors and options whose master reference points at a deleted master.
fn check_master_references(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> Result<()> {
    for (table, master_table, noun) in [
        ("colors", "master_colors", "color"),
        ("options", "master_options", "option"),
    ] {
        let sql = format!(
            "SELECT x.id, x.name, x.master_id FROM {} x
             LEFT JOIN {} m ON x.master_id = m.id
             WHERE x.master_id IS NOT NULL AND m.id IS NULL",
            table, master_table
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (id, name, master_id) in rows {
            issues.push(IntegrityIssue {
                severity: Severity::Critical,
                entity: noun.to_string(),
                entity_id: id,
                message: format!(
                    "{} '{}' references missing master '{}'",
                    noun, name, master_id
                ),
            });
        }
    }
    Ok(())
}

/// Vehicles and masters whose brand no longer exists.
fn check_brand_references(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> Result<()> {
    for (table, noun) in [
        ("vehicles", "vehicle"),
        ("master_colors", "master color"),
        ("master_options", "master option"),
    ] {
        let sql = format!(
            "SELECT x.id, x.name, x.brand_id FROM {} x
             LEFT JOIN brands b ON x.brand_id = b.id
             WHERE b.id IS NULL",
            table
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (id, name, brand_id) in rows {
            issues.push(IntegrityIssue {
                severity: Severity::Critical,
                entity: noun.to_string(),
                entity_id: id,
                message: format!("{} '{}' references missing brand '{}'", noun, name, brand_id),
            });
        }
    }
    Ok(())
}

/// Trims, colors and options whose vehicle no longer exists.
fn check_vehicle_references(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> Result<()> {
    for (table, noun) in [("trims", "trim"), ("colors", "color"), ("options", "option")] {
        let sql = format!(
            "SELECT x.id, x.name, x.vehicle_id FROM {} x
             LEFT JOIN vehicles v ON x.vehicle_id = v.id
             WHERE v.id IS NULL",
            table
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (id, name, vehicle_id) in rows {
            issues.push(IntegrityIssue {
                severity: Severity::Critical,
                entity: noun.to_string(),
                entity_id: id,
                message: format!(
                    "{} '{}' references missing vehicle '{}'",
                    noun, name, vehicle_id
                ),
            });
        }
    }
    Ok(())
}

/// Eligibility rows pointing at deleted rows, or joining across vehicles.
fn check_eligibility_rows(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> Result<()> {
    for (join_table, ref_table, ref_column, entity, ref_noun) in [
        ("trim_colors", "trims", "trim_id", "trim_color", "trim"),
        ("trim_colors", "colors", "color_id", "trim_color", "color"),
        ("trim_options", "trims", "trim_id", "trim_option", "trim"),
        ("trim_options", "options", "option_id", "trim_option", "option"),
    ] {
        let sql = format!(
            "SELECT j.id, j.{} FROM {} j LEFT JOIN {} r ON j.{} = r.id WHERE r.id IS NULL",
            ref_column, join_table, ref_table, ref_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (id, ref_id) in rows {
            issues.push(IntegrityIssue {
                severity: Severity::Critical,
                entity: entity.to_string(),
                entity_id: id,
                message: format!("eligibility row references missing {} '{}'", ref_noun, ref_id),
            });
        }
    }

    for (join_table, item_table, item_column, entity, noun) in [
        ("trim_colors", "colors", "color_id", "trim_color", "color"),
        ("trim_options", "options", "option_id", "trim_option", "option"),
    ] {
        let sql = format!(
            "SELECT j.id, t.name, x.name FROM {} j
             JOIN trims t ON j.trim_id = t.id
             JOIN {} x ON j.{} = x.id
             WHERE t.vehicle_id != x.vehicle_id",
            join_table, item_table, item_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (id, trim_name, item_name) in rows {
            issues.push(IntegrityIssue {
                severity: Severity::Critical,
                entity: entity.to_string(),
                entity_id: id,
                message: format!(
                    "trim '{}' lists {} '{}' from another vehicle",
                    trim_name, noun, item_name
                ),
            });
        }
    }
    Ok(())
}

/// Master references that cross brand namespaces.
fn check_cross_brand_masters(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> Result<()> {
    for (table, master_table, noun) in [
        ("colors", "master_colors", "color"),
        ("options", "master_options", "option"),
    ] {
        let sql = format!(
            "SELECT x.id, x.name, m.name FROM {} x
             JOIN vehicles v ON x.vehicle_id = v.id
             JOIN {} m ON x.master_id = m.id
             WHERE m.brand_id != v.brand_id",
            table, master_table
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (id, name, master_name) in rows {
            issues.push(IntegrityIssue {
                severity: Severity::Warning,
                entity: noun.to_string(),
                entity_id: id,
                message: format!(
                    "{} '{}' references master '{}' of another brand",
                    noun, name, master_name
                ),
            });
        }
    }
    Ok(())
}

/// Names colliding case-insensitively inside one vehicle.
/// SQLite LOWER only folds ASCII, so the grouping happens in Rust.
fn check_duplicate_names(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> Result<()> {
    let mut stmt = conn.prepare("SELECT vehicle_id, kind, name FROM colors")?;
    let color_rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut color_groups: HashMap<(String, String, String), (String, usize)> = HashMap::new();
    for (vehicle_id, kind, name) in color_rows {
        let entry = color_groups
            .entry((vehicle_id, kind, name.to_lowercase()))
            .or_insert_with(|| (name.clone(), 0));
        entry.1 += 1;
    }
    for ((vehicle_id, kind, _), (name, count)) in color_groups {
        if count > 1 {
            issues.push(IntegrityIssue {
                severity: Severity::Warning,
                entity: "vehicle".to_string(),
                entity_id: vehicle_id,
                message: format!(
                    "vehicle has {} {} colors sharing the name '{}'",
                    count, kind, name
                ),
            });
        }
    }

    for (table, noun) in [("options", "option"), ("trims", "trim")] {
        let sql = format!("SELECT vehicle_id, name FROM {}", table);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        flag_name_duplicates(rows, noun, issues);
    }
    Ok(())
}

fn flag_name_duplicates(
    rows: Vec<(String, String)>,
    noun: &str,
    issues: &mut Vec<IntegrityIssue>,
) {
    let mut groups: HashMap<(String, String), (String, usize)> = HashMap::new();
    for (vehicle_id, name) in rows {
        let entry = groups
            .entry((vehicle_id, name.to_lowercase()))
            .or_insert_with(|| (name.clone(), 0));
        entry.1 += 1;
    }
    for ((vehicle_id, _), (name, count)) in groups {
        if count > 1 {
            issues.push(IntegrityIssue {
                severity: Severity::Warning,
                entity: "vehicle".to_string(),
                entity_id: vehicle_id,
                message: format!("vehicle has {} {}s sharing the name '{}'", count, noun, name),
            });
        }
    }
}

/// Blank names never match the similarity heuristic, so they surface here.
fn check_blank_names(conn: &Connection, issues: &mut Vec<IntegrityIssue>) -> Result<()> {
    for (table, noun) in [
        ("brands", "brand"),
        ("vehicles", "vehicle"),
        ("trims", "trim"),
        ("colors", "color"),
        ("options", "option"),
        ("master_colors", "master color"),
        ("master_options", "master option"),
    ] {
        let sql = format!("SELECT id, name FROM {}", table);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (id, name) in rows {
            if name.trim().is_empty() {
                issues.push(IntegrityIssue {
                    severity: Severity::Warning,
                    entity: noun.to_string(),
                    entity_id: id,
                    message: format!("{} has a blank name", noun),
                });
            }
        }
    }
    Ok(())
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        insert_brand, insert_color, insert_master_color, insert_option, insert_trim,
        insert_vehicle, link_trim_color, setup_catalog,
    };
    use crate::entities::{Brand, Color, ColorKind, MasterColor, OptionItem, Trim, Vehicle};
    use rusqlite::params;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_catalog(&conn).unwrap();
        conn
    }

    struct Fixture {
        brand: Brand,
        vehicle: Vehicle,
        trim: Trim,
        color: Color,
    }

    fn seed_healthy_catalog(conn: &Connection) -> Fixture {
        let brand = Brand::new("Hyundai");
        insert_brand(conn, &brand).unwrap();
        let vehicle = Vehicle::new(&brand.id, "Tucson", 30_000_000);
        insert_vehicle(conn, &vehicle).unwrap();
        let trim = Trim::new(&vehicle.id, "Premium", 1_000_000);
        insert_trim(conn, &trim).unwrap();

        let master = MasterColor::new(&brand.id, "Pearl White");
        insert_master_color(conn, &master).unwrap();
        let mut color = Color::new(&vehicle.id, ColorKind::Exterior, "Pearl White", 300_000);
        color.master_id = Some(master.id.clone());
        insert_color(conn, &color).unwrap();

        insert_option(conn, &OptionItem::new(&vehicle.id, "Sunroof", 500_000)).unwrap();

        link_trim_color(conn, &trim.id, &color.id).unwrap();

        Fixture {
            brand,
            vehicle,
            trim,
            color,
        }
    }

    #[test]
    fn test_clean_catalog_has_no_issues() {
        let conn = test_conn();
        seed_healthy_catalog(&conn);

        let report = audit_catalog(&conn).unwrap();
        assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
        assert!(!report.has_critical_issues());
    }

    #[test]
    fn test_detects_missing_master_reference() {
        let conn = test_conn();
        let fixture = seed_healthy_catalog(&conn);

        conn.execute(
            "UPDATE colors SET master_id = 'ghost-master' WHERE id = ?1",
            params![fixture.color.id],
        )
        .unwrap();

        let report = audit_catalog(&conn).unwrap();
        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.severity, Severity::Critical);
        assert_eq!(issue.entity, "color");
        assert!(issue.message.contains("ghost-master"));
    }

    #[test]
    fn test_detects_orphan_vehicle_rows() {
        let conn = test_conn();
        let brand = Brand::new("Hyundai");
        insert_brand(&conn, &brand).unwrap();
        let vehicle = Vehicle::new(&brand.id, "Tucson", 30_000_000);
        insert_vehicle(&conn, &vehicle).unwrap();
        insert_trim(&conn, &Trim::new(&vehicle.id, "Premium", 0)).unwrap();
        insert_color(
            &conn,
            &Color::new(&vehicle.id, ColorKind::Exterior, "Black", 0),
        )
        .unwrap();
        insert_option(&conn, &OptionItem::new(&vehicle.id, "Sunroof", 0)).unwrap();

        conn.execute("DELETE FROM vehicles WHERE id = ?1", params![vehicle.id])
            .unwrap();

        let report = audit_catalog(&conn).unwrap();
        assert_eq!(report.count_by(Severity::Critical), 3);
        let entities: Vec<&str> = report.issues.iter().map(|i| i.entity.as_str()).collect();
        assert!(entities.contains(&"trim"));
        assert!(entities.contains(&"color"));
        assert!(entities.contains(&"option"));
    }

    #[test]
    fn test_detects_cross_vehicle_eligibility() {
        let conn = test_conn();
        let fixture = seed_healthy_catalog(&conn);
        let other = Vehicle::new(&fixture.brand.id, "Avante", 22_000_000);
        insert_vehicle(&conn, &other).unwrap();
        let foreign_color = Color::new(&other.id, ColorKind::Exterior, "Amazon Gray", 0);
        insert_color(&conn, &foreign_color).unwrap();

        // the store refuses this link, so simulate drift directly
        conn.execute(
            "INSERT INTO trim_colors (id, trim_id, color_id) VALUES ('drifted', ?1, ?2)",
            params![fixture.trim.id, foreign_color.id],
        )
        .unwrap();

        let report = audit_catalog(&conn).unwrap();
        assert!(report.has_critical_issues());
        assert!(report
            .issues
            .iter()
            .any(|i| i.entity == "trim_color" && i.message.contains("another vehicle")));
    }

    #[test]
    fn test_detects_missing_eligibility_reference() {
        let conn = test_conn();
        let fixture = seed_healthy_catalog(&conn);

        conn.execute(
            "INSERT INTO trim_options (id, trim_id, option_id, price_override, included)
             VALUES ('drifted', ?1, 'ghost-option', NULL, 0)",
            params![fixture.trim.id],
        )
        .unwrap();

        let report = audit_catalog(&conn).unwrap();
        assert_eq!(report.count_by(Severity::Critical), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.entity, "trim_option");
        assert!(issue.message.contains("ghost-option"));
    }

    #[test]
    fn test_flags_case_insensitive_duplicates() {
        let conn = test_conn();
        let fixture = seed_healthy_catalog(&conn);

        // same kind collides, the other kind does not
        insert_color(
            &conn,
            &Color::new(
                &fixture.vehicle.id,
                ColorKind::Exterior,
                "PEARL WHITE",
                0,
            ),
        )
        .unwrap();
        insert_color(
            &conn,
            &Color::new(
                &fixture.vehicle.id,
                ColorKind::Interior,
                "pearl white",
                0,
            ),
        )
        .unwrap();
        insert_option(
            &conn,
            &OptionItem::new(&fixture.vehicle.id, "SUNROOF", 500_000),
        )
        .unwrap();

        let report = audit_catalog(&conn).unwrap();
        assert_eq!(report.count_by(Severity::Warning), 2);
        assert_eq!(report.count_by(Severity::Critical), 0);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("EXTERIOR colors")));
        assert!(report.issues.iter().any(|i| i.message.contains("options")));
    }

    #[test]
    fn test_flags_blank_names() {
        let conn = test_conn();
        let fixture = seed_healthy_catalog(&conn);
        insert_option(&conn, &OptionItem::new(&fixture.vehicle.id, "   ", 0)).unwrap();

        let report = audit_catalog(&conn).unwrap();
        assert_eq!(report.count_by(Severity::Warning), 1);
        assert!(report.issues[0].message.contains("blank name"));
    }

    #[test]
    fn test_flags_cross_brand_master() {
        let conn = test_conn();
        let fixture = seed_healthy_catalog(&conn);
        let kia = Brand::new("Kia");
        insert_brand(&conn, &kia).unwrap();
        let foreign_master = MasterColor::new(&kia.id, "Snow White Pearl");
        insert_master_color(&conn, &foreign_master).unwrap();

        conn.execute(
            "UPDATE colors SET master_id = ?1 WHERE id = ?2",
            params![foreign_master.id, fixture.color.id],
        )
        .unwrap();

        let report = audit_catalog(&conn).unwrap();
        assert_eq!(report.count_by(Severity::Warning), 1);
        assert!(report.issues[0].message.contains("another brand"));
        // still a live reference, not a critical break
        assert!(!report.has_critical_issues());
    }

    #[test]
    fn test_report_summary_counts() {
        let report = IntegrityReport {
            checked_at: Utc::now(),
            issues: vec![
                IntegrityIssue {
                    severity: Severity::Critical,
                    entity: "color".to_string(),
                    entity_id: "c1".to_string(),
                    message: "broken".to_string(),
                },
                IntegrityIssue {
                    severity: Severity::Warning,
                    entity: "vehicle".to_string(),
                    entity_id: "v1".to_string(),
                    message: "odd".to_string(),
                },
            ],
        };
        assert!(!report.is_clean());
        assert!(report.has_critical_issues());
        assert_eq!(report.count_by(Severity::Critical), 1);
        assert_eq!(report.count_by(Severity::Warning), 1);
        assert_eq!(report.count_by(Severity::Info), 0);
        assert_eq!(report.summary(), "Integrity: 2 issue(s) (1 critical, 1 warning)");
    }
}
