// Lease Catalog Engine - CLI
// Operator entry points: seed demo data, quote a build, list duplicate
// suggestions, import a price sheet, audit referential integrity.

use anyhow::{bail, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;

use lease_catalog::{
    audit_catalog, insert_brand, insert_color, insert_option, insert_trim, insert_vehicle,
    insert_vehicle_sheet, link_trim_color, link_trim_option, list_brands, list_master_colors,
    list_master_options, load_vehicle_sheet, quote_vehicle, setup_catalog, Brand, Color,
    ColorKind, MasterKind, OptionItem, QuoteRequest, Severity, SimilarityCandidate,
    SimilarityDetector, Trim, Vehicle,
};

const DEFAULT_DB: &str = "catalog.db";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("seed") => run_seed(args.get(2).map(String::as_str).unwrap_or(DEFAULT_DB)),
        Some("quote") => run_quote(&args[2..]),
        Some("similar") => run_similar(&args[2..]),
        Some("import-sheet") => run_import_sheet(&args[2..]),
        Some("audit") => run_audit(args.get(2).map(String::as_str).unwrap_or(DEFAULT_DB)),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("🚗 Lease Catalog Engine v{}", lease_catalog::VERSION);
    println!();
    println!("Usage:");
    println!("  lease-catalog seed [db]");
    println!("  lease-catalog quote <db> <vehicle-id> <period> <deposit-ratio> [trim-id]");
    println!("  lease-catalog similar <db> <brand-id> <color|option>");
    println!("  lease-catalog import-sheet <db> <brand-id> <sheet.csv>");
    println!("  lease-catalog audit [db]");
}

fn open_catalog(path: &str) -> Result<Connection> {
    let conn = Connection::open(Path::new(path))?;
    setup_catalog(&conn)?;
    Ok(conn)
}

/// Seed a small demo catalog: one brand, two vehicles, a trim with
/// eligibility wiring, and a rate matrix worth quoting against.
fn run_seed(db_path: &str) -> Result<()> {
    println!("🌱 Seeding demo catalog into {}", db_path);

    let conn = open_catalog(db_path)?;

    let brand = Brand::new("Hyundai");
    insert_brand(&conn, &brand)?;
    println!("✓ Brand: {} ({})", brand.name, brand.id);

    let mut tucson = Vehicle::new(&brand.id, "Tucson", 30_000_000);
    tucson.rates.set(60, 0, 450_000);
    tucson.rates.set(60, 50, 280_000);
    tucson.rates.set(48, 0, 520_000);
    tucson.rates.set(48, 30, 390_000);
    insert_vehicle(&conn, &tucson)?;

    let mut avante = Vehicle::new(&brand.id, "Avante", 22_000_000);
    avante.rates.set(36, 0, 610_000);
    avante.rates.set(60, 0, 380_000);
    insert_vehicle(&conn, &avante)?;
    println!("✓ Vehicles: Tucson ({}), Avante ({})", tucson.id, avante.id);

    let trim = Trim::new(&tucson.id, "Premium", 1_000_000);
    insert_trim(&conn, &trim)?;

    let exterior = Color::new(&tucson.id, ColorKind::Exterior, "Pearl White", 300_000);
    insert_color(&conn, &exterior)?;
    let interior = Color::new(&tucson.id, ColorKind::Interior, "Black Leather", 0);
    insert_color(&conn, &interior)?;
    let sunroof = OptionItem::new(&tucson.id, "Sunroof", 350_000);
    insert_option(&conn, &sunroof)?;
    let audio = OptionItem::new(&tucson.id, "Premium Audio", 150_000);
    insert_option(&conn, &audio)?;

    link_trim_color(&conn, &trim.id, &exterior.id)?;
    link_trim_color(&conn, &trim.id, &interior.id)?;
    link_trim_option(&conn, &trim.id, &sunroof.id, None, false)?;
    link_trim_option(&conn, &trim.id, &audio.id, Some(100_000), true)?;
    println!("✓ Trim: Premium ({}) with 2 colors, 2 options", trim.id);

    println!("\n🎉 Seed complete");
    Ok(())
}

fn run_quote(args: &[String]) -> Result<()> {
    if args.len() < 4 {
        bail!("usage: quote <db> <vehicle-id> <period> <deposit-ratio> [trim-id]");
    }
    let conn = open_catalog(&args[0])?;

    let request = QuoteRequest {
        vehicle_id: args[1].clone(),
        trim_id: args.get(4).cloned(),
        exterior_color_id: None,
        interior_color_id: None,
        option_ids: vec![],
        period: args[2].parse()?,
        deposit_ratio: args[3].parse()?,
    };

    println!("🧾 Quoting vehicle {}...", request.vehicle_id);
    let breakdown = quote_vehicle(&conn, &request)?;

    println!("✓ {}", breakdown.summary());
    println!("{}", serde_json::to_string_pretty(&breakdown)?);
    Ok(())
}

fn run_similar(args: &[String]) -> Result<()> {
    if args.len() < 3 {
        bail!("usage: similar <db> <brand-id> <color|option>");
    }
    let conn = open_catalog(&args[0])?;
    let brand_id = &args[1];
    let Some(kind) = MasterKind::parse(&args[2]) else {
        bail!("unknown master kind '{}': expected color or option", args[2]);
    };

    let candidates: Vec<SimilarityCandidate> = match kind {
        MasterKind::Color => list_master_colors(&conn, brand_id)?
            .into_iter()
            .map(|m| SimilarityCandidate {
                id: m.id,
                name: m.name,
            })
            .collect(),
        MasterKind::Option => list_master_options(&conn, brand_id)?
            .into_iter()
            .map(|m| SimilarityCandidate {
                id: m.id,
                name: m.name,
            })
            .collect(),
    };

    println!(
        "🔍 Screening {} master {}(s) for duplicates...",
        candidates.len(),
        kind.as_str()
    );
    let pairs = SimilarityDetector::new().find_similar_pairs(&candidates);

    if pairs.is_empty() {
        println!("✓ No likely duplicates found");
    } else {
        println!("✓ {} candidate pair(s):", pairs.len());
        for pair in &pairs {
            println!(
                "  '{}' ({}) ↔ '{}' ({})",
                pair.left_name, pair.left_id, pair.right_name, pair.right_id
            );
        }
    }
    Ok(())
}

fn run_import_sheet(args: &[String]) -> Result<()> {
    if args.len() < 3 {
        bail!("usage: import-sheet <db> <brand-id> <sheet.csv>");
    }
    let mut conn = open_catalog(&args[0])?;

    println!("📂 Loading price sheet {}...", args[2]);
    let rows = load_vehicle_sheet(Path::new(&args[2]))?;
    println!("✓ Parsed {} vehicle row(s)", rows.len());

    insert_vehicle_sheet(&mut conn, &args[1], &rows)?;
    Ok(())
}

fn run_audit(db_path: &str) -> Result<()> {
    println!("🔎 Auditing catalog {}...", db_path);
    let conn = open_catalog(db_path)?;

    let brands = list_brands(&conn)?;
    println!("✓ {} brand(s) in catalog", brands.len());

    let report = audit_catalog(&conn)?;
    println!("✓ {}", report.summary());

    for issue in &report.issues {
        let marker = match issue.severity {
            Severity::Critical => "✗",
            Severity::Warning => "⚠",
            Severity::Info => "·",
        };
        println!("  {} [{}] {}", marker, issue.entity, issue.message);
    }

    if report.has_critical_issues() {
        std::process::exit(1);
    }
    Ok(())
}
