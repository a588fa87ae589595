// 🗄️ Catalog Store - SQLite persistence for brands, vehicles, trims, colors, options and masters
//
// Referential rules (master references, eligibility scoping, delete guards) are
// enforced here in Rust rather than with SQL constraints, so every violation
// surfaces as a typed CatalogError instead of a driver error.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use crate::entities::{
    Brand, Color, ColorKind, MasterColor, MasterOption, OptionItem, Trim, TrimColor, TrimOption,
    Vehicle,
};
use crate::error::{CatalogError, Result};
use crate::pricing::{parse_cell_key, PriceMatrix};

// ===== SCHEMA =====

/// Create all catalog tables and indexes. Idempotent.
pub fn setup_catalog(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS brands (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // rent_prices holds the serialized rate matrix (rentPrice{period}_{ratio} cells)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles (
            id TEXT PRIMARY KEY,
            brand_id TEXT NOT NULL,
            name TEXT NOT NULL,
            base_price INTEGER NOT NULL DEFAULT 0,
            rent_prices TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trims (
            id TEXT PRIMARY KEY,
            vehicle_id TEXT NOT NULL,
            name TEXT NOT NULL,
            price INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS colors (
            id TEXT PRIMARY KEY,
            vehicle_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            hex TEXT,
            price INTEGER NOT NULL DEFAULT 0,
            master_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS options (
            id TEXT PRIMARY KEY,
            vehicle_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT,
            price INTEGER NOT NULL DEFAULT 0,
            master_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS master_colors (
            id TEXT PRIMARY KEY,
            brand_id TEXT NOT NULL,
            name TEXT NOT NULL,
            hex TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS master_options (
            id TEXT PRIMARY KEY,
            brand_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trim_colors (
            id TEXT PRIMARY KEY,
            trim_id TEXT NOT NULL,
            color_id TEXT NOT NULL
        )",
        [],
    )?;

    // price_override NULL means the option keeps its vehicle-level price
    conn.execute(
        "CREATE TABLE IF NOT EXISTS trim_options (
            id TEXT PRIMARY KEY,
            trim_id TEXT NOT NULL,
            option_id TEXT NOT NULL,
            price_override INTEGER,
            included INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            actor TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_vehicles_brand ON vehicles(brand_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trims_vehicle ON trims(vehicle_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_colors_vehicle ON colors(vehicle_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_colors_master ON colors(master_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_options_vehicle ON options(vehicle_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_options_master ON options(master_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trim_colors_trim ON trim_colors(trim_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trim_options_trim ON trim_options(trim_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

// ===== ROW MAPPING =====

fn read_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

fn id_exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("SELECT 1 FROM {} WHERE id = ?1", table))?;
    Ok(stmt.exists(params![id])?)
}

fn map_brand_row(row: &rusqlite::Row) -> rusqlite::Result<Brand> {
    let created_at: String = row.get(2)?;
    let updated_at: String = row.get(3)?;
    Ok(Brand {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}

fn map_vehicle_row(row: &rusqlite::Row) -> rusqlite::Result<Vehicle> {
    let rates_json: String = row.get(4)?;
    let rates: PriceMatrix =
        serde_json::from_str(&rates_json).map_err(|_| rusqlite::Error::InvalidQuery)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Vehicle {
        id: row.get(0)?,
        brand_id: row.get(1)?,
        name: row.get(2)?,
        base_price: row.get(3)?,
        rates,
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}

fn map_trim_row(row: &rusqlite::Row) -> rusqlite::Result<Trim> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(Trim {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}

fn map_color_row(row: &rusqlite::Row) -> rusqlite::Result<Color> {
    let kind_text: String = row.get(2)?;
    let kind = ColorKind::parse(&kind_text).ok_or(rusqlite::Error::InvalidQuery)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Color {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        kind,
        name: row.get(3)?,
        hex: row.get(4)?,
        price: row.get(5)?,
        master_id: row.get(6)?,
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}

fn map_option_row(row: &rusqlite::Row) -> rusqlite::Result<OptionItem> {
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(OptionItem {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        master_id: row.get(5)?,
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}

fn map_master_color_row(row: &rusqlite::Row) -> rusqlite::Result<MasterColor> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(MasterColor {
        id: row.get(0)?,
        brand_id: row.get(1)?,
        name: row.get(2)?,
        hex: row.get(3)?,
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}

fn map_master_option_row(row: &rusqlite::Row) -> rusqlite::Result<MasterOption> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(MasterOption {
        id: row.get(0)?,
        brand_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}

// ===== BRANDS =====

pub fn insert_brand(conn: &Connection, brand: &Brand) -> Result<()> {
    conn.execute(
        "INSERT INTO brands (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            brand.id,
            brand.name,
            brand.created_at.to_rfc3339(),
            brand.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_brand(conn: &Connection, id: &str) -> Result<Brand> {
    let mut stmt =
        conn.prepare("SELECT id, name, created_at, updated_at FROM brands WHERE id = ?1")?;
    stmt.query_row(params![id], map_brand_row)
        .optional()?
        .ok_or_else(|| CatalogError::not_found("brand", id))
}

pub fn list_brands(conn: &Connection) -> Result<Vec<Brand>> {
    let mut stmt =
        conn.prepare("SELECT id, name, created_at, updated_at FROM brands ORDER BY name")?;
    let brands = stmt
        .query_map([], map_brand_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(brands)
}

// ===== VEHICLES =====

pub fn insert_vehicle(conn: &Connection, vehicle: &Vehicle) -> Result<()> {
    if !id_exists(conn, "brands", &vehicle.brand_id)? {
        return Err(CatalogError::not_found("brand", &vehicle.brand_id));
    }
    let rates_json = serde_json::to_string(&vehicle.rates)?;
    conn.execute(
        "INSERT INTO vehicles (id, brand_id, name, base_price, rent_prices, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            vehicle.id,
            vehicle.brand_id,
            vehicle.name,
            vehicle.base_price,
            rates_json,
            vehicle.created_at.to_rfc3339(),
            vehicle.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_vehicle(conn: &Connection, id: &str) -> Result<Vehicle> {
    let mut stmt = conn.prepare(
        "SELECT id, brand_id, name, base_price, rent_prices, created_at, updated_at
         FROM vehicles WHERE id = ?1",
    )?;
    stmt.query_row(params![id], map_vehicle_row)
        .optional()?
        .ok_or_else(|| CatalogError::not_found("vehicle", id))
}

pub fn list_vehicles_for_brand(conn: &Connection, brand_id: &str) -> Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(
        "SELECT id, brand_id, name, base_price, rent_prices, created_at, updated_at
         FROM vehicles WHERE brand_id = ?1 ORDER BY name",
    )?;
    let vehicles = stmt
        .query_map(params![brand_id], map_vehicle_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(vehicles)
}

/// Replace a vehicle's rate matrix.
pub fn update_vehicle_rates(conn: &Connection, vehicle_id: &str, rates: &PriceMatrix) -> Result<()> {
    let rates_json = serde_json::to_string(rates)?;
    let updated = conn.execute(
        "UPDATE vehicles SET rent_prices = ?1, updated_at = ?2 WHERE id = ?3",
        params![rates_json, Utc::now().to_rfc3339(), vehicle_id],
    )?;
    if updated == 0 {
        return Err(CatalogError::not_found("vehicle", vehicle_id));
    }
    Ok(())
}

// ===== TRIMS =====

pub fn insert_trim(conn: &Connection, trim: &Trim) -> Result<()> {
    if !id_exists(conn, "vehicles", &trim.vehicle_id)? {
        return Err(CatalogError::not_found("vehicle", &trim.vehicle_id));
    }
    conn.execute(
        "INSERT INTO trims (id, vehicle_id, name, price, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            trim.id,
            trim.vehicle_id,
            trim.name,
            trim.price,
            trim.created_at.to_rfc3339(),
            trim.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_trim(conn: &Connection, id: &str) -> Result<Trim> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, name, price, created_at, updated_at FROM trims WHERE id = ?1",
    )?;
    stmt.query_row(params![id], map_trim_row)
        .optional()?
        .ok_or_else(|| CatalogError::not_found("trim", id))
}

pub fn list_trims_for_vehicle(conn: &Connection, vehicle_id: &str) -> Result<Vec<Trim>> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, name, price, created_at, updated_at
         FROM trims WHERE vehicle_id = ?1 ORDER BY name",
    )?;
    let trims = stmt
        .query_map(params![vehicle_id], map_trim_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(trims)
}

/// Delete a trim together with its eligibility rows.
pub fn delete_trim(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction()?;

    get_trim(&tx, id)?;
    tx.execute("DELETE FROM trim_colors WHERE trim_id = ?1", params![id])?;
    tx.execute("DELETE FROM trim_options WHERE trim_id = ?1", params![id])?;
    tx.execute("DELETE FROM trims WHERE id = ?1", params![id])?;

    tx.commit()?;
    Ok(())
}

// ===== COLORS =====

pub fn insert_color(conn: &Connection, color: &Color) -> Result<()> {
    if !id_exists(conn, "vehicles", &color.vehicle_id)? {
        return Err(CatalogError::not_found("vehicle", &color.vehicle_id));
    }
    conn.execute(
        "INSERT INTO colors (id, vehicle_id, kind, name, hex, price, master_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            color.id,
            color.vehicle_id,
            color.kind.as_str(),
            color.name,
            color.hex,
            color.price,
            color.master_id,
            color.created_at.to_rfc3339(),
            color.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_color(conn: &Connection, id: &str) -> Result<Color> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, kind, name, hex, price, master_id, created_at, updated_at
         FROM colors WHERE id = ?1",
    )?;
    stmt.query_row(params![id], map_color_row)
        .optional()?
        .ok_or_else(|| CatalogError::not_found("color", id))
}

pub fn list_colors_for_vehicle(conn: &Connection, vehicle_id: &str) -> Result<Vec<Color>> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, kind, name, hex, price, master_id, created_at, updated_at
         FROM colors WHERE vehicle_id = ?1 ORDER BY kind, name",
    )?;
    let colors = stmt
        .query_map(params![vehicle_id], map_color_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(colors)
}

/// Delete a color unless a trim still lists it as eligible.
pub fn delete_color(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction()?;

    let color = get_color(&tx, id)?;
    let referencing: i64 = tx.query_row(
        "SELECT COUNT(*) FROM trim_colors WHERE color_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if referencing > 0 {
        return Err(CatalogError::ReferentialIntegrity(format!(
            "color '{}' is still eligible on {} trim(s)",
            color.name, referencing
        )));
    }
    tx.execute("DELETE FROM colors WHERE id = ?1", params![id])?;

    tx.commit()?;
    Ok(())
}

/// Point a color at a master color, or clear the reference with `None`.
/// The master must belong to the same brand as the color's vehicle.
pub fn set_color_master(conn: &Connection, color_id: &str, master_id: Option<&str>) -> Result<()> {
    let color = get_color(conn, color_id)?;
    if let Some(master_id) = master_id {
        let master = get_master_color(conn, master_id)?;
        let vehicle = get_vehicle(conn, &color.vehicle_id)?;
        if master.brand_id != vehicle.brand_id {
            return Err(CatalogError::ReferentialIntegrity(format!(
                "master color '{}' belongs to another brand",
                master.name
            )));
        }
    }
    conn.execute(
        "UPDATE colors SET master_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![master_id, Utc::now().to_rfc3339(), color_id],
    )?;
    Ok(())
}

// ===== OPTIONS =====

pub fn insert_option(conn: &Connection, option: &OptionItem) -> Result<()> {
    if !id_exists(conn, "vehicles", &option.vehicle_id)? {
        return Err(CatalogError::not_found("vehicle", &option.vehicle_id));
    }
    conn.execute(
        "INSERT INTO options (id, vehicle_id, name, category, price, master_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            option.id,
            option.vehicle_id,
            option.name,
            option.category,
            option.price,
            option.master_id,
            option.created_at.to_rfc3339(),
            option.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_option(conn: &Connection, id: &str) -> Result<OptionItem> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, name, category, price, master_id, created_at, updated_at
         FROM options WHERE id = ?1",
    )?;
    stmt.query_row(params![id], map_option_row)
        .optional()?
        .ok_or_else(|| CatalogError::not_found("option", id))
}

pub fn list_options_for_vehicle(conn: &Connection, vehicle_id: &str) -> Result<Vec<OptionItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, name, category, price, master_id, created_at, updated_at
         FROM options WHERE vehicle_id = ?1 ORDER BY name",
    )?;
    let options = stmt
        .query_map(params![vehicle_id], map_option_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(options)
}

/// Delete an option unless a trim still lists it as eligible.
pub fn delete_option(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction()?;

    let option = get_option(&tx, id)?;
    let referencing: i64 = tx.query_row(
        "SELECT COUNT(*) FROM trim_options WHERE option_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if referencing > 0 {
        return Err(CatalogError::ReferentialIntegrity(format!(
            "option '{}' is still eligible on {} trim(s)",
            option.name, referencing
        )));
    }
    tx.execute("DELETE FROM options WHERE id = ?1", params![id])?;

    tx.commit()?;
    Ok(())
}

/// Point an option at a master option, or clear the reference with `None`.
pub fn set_option_master(conn: &Connection, option_id: &str, master_id: Option<&str>) -> Result<()> {
    let option = get_option(conn, option_id)?;
    if let Some(master_id) = master_id {
        let master = get_master_option(conn, master_id)?;
        let vehicle = get_vehicle(conn, &option.vehicle_id)?;
        if master.brand_id != vehicle.brand_id {
            return Err(CatalogError::ReferentialIntegrity(format!(
                "master option '{}' belongs to another brand",
                master.name
            )));
        }
    }
    conn.execute(
        "UPDATE options SET master_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![master_id, Utc::now().to_rfc3339(), option_id],
    )?;
    Ok(())
}

// ===== MASTER COLORS =====

pub fn insert_master_color(conn: &Connection, master: &MasterColor) -> Result<()> {
    if !id_exists(conn, "brands", &master.brand_id)? {
        return Err(CatalogError::not_found("brand", &master.brand_id));
    }
    conn.execute(
        "INSERT INTO master_colors (id, brand_id, name, hex, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            master.id,
            master.brand_id,
            master.name,
            master.hex,
            master.created_at.to_rfc3339(),
            master.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_master_color(conn: &Connection, id: &str) -> Result<MasterColor> {
    let mut stmt = conn.prepare(
        "SELECT id, brand_id, name, hex, created_at, updated_at FROM master_colors WHERE id = ?1",
    )?;
    stmt.query_row(params![id], map_master_color_row)
        .optional()?
        .ok_or_else(|| CatalogError::not_found("master color", id))
}

pub fn list_master_colors(conn: &Connection, brand_id: &str) -> Result<Vec<MasterColor>> {
    let mut stmt = conn.prepare(
        "SELECT id, brand_id, name, hex, created_at, updated_at
         FROM master_colors WHERE brand_id = ?1 ORDER BY name",
    )?;
    let masters = stmt
        .query_map(params![brand_id], map_master_color_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(masters)
}

/// Number of distinct vehicles with at least one color referencing this master.
pub fn master_color_vehicle_count(conn: &Connection, master_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(DISTINCT vehicle_id) FROM colors WHERE master_id = ?1",
        params![master_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Delete a master color. Refused while any vehicle color still references it;
/// the usage count is re-read inside the transaction.
pub fn delete_master_color(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction()?;

    let master = get_master_color(&tx, id)?;
    let vehicles = master_color_vehicle_count(&tx, id)?;
    if vehicles > 0 {
        return Err(CatalogError::ReferentialIntegrity(format!(
            "master color '{}' is still used by {} vehicle(s)",
            master.name, vehicles
        )));
    }
    tx.execute("DELETE FROM master_colors WHERE id = ?1", params![id])?;

    let event = Event::new(
        "master_color_deleted",
        "master_color",
        id,
        serde_json::json!({ "name": master.name }),
        "catalog_admin",
    );
    insert_event(&tx, &event)?;

    tx.commit()?;
    Ok(())
}

/// Find a brand's master color by case-insensitive name, creating it if absent.
pub fn ensure_master_color(
    conn: &Connection,
    brand_id: &str,
    name: &str,
    hex: Option<&str>,
) -> Result<MasterColor> {
    let wanted = name.to_lowercase();
    for master in list_master_colors(conn, brand_id)? {
        if master.name.to_lowercase() == wanted {
            return Ok(master);
        }
    }
    let mut master = MasterColor::new(brand_id, name);
    master.hex = hex.map(str::to_string);
    insert_master_color(conn, &master)?;
    Ok(master)
}

// ===== MASTER OPTIONS =====

pub fn insert_master_option(conn: &Connection, master: &MasterOption) -> Result<()> {
    if !id_exists(conn, "brands", &master.brand_id)? {
        return Err(CatalogError::not_found("brand", &master.brand_id));
    }
    conn.execute(
        "INSERT INTO master_options (id, brand_id, name, category, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            master.id,
            master.brand_id,
            master.name,
            master.category,
            master.created_at.to_rfc3339(),
            master.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_master_option(conn: &Connection, id: &str) -> Result<MasterOption> {
    let mut stmt = conn.prepare(
        "SELECT id, brand_id, name, category, created_at, updated_at
         FROM master_options WHERE id = ?1",
    )?;
    stmt.query_row(params![id], map_master_option_row)
        .optional()?
        .ok_or_else(|| CatalogError::not_found("master option", id))
}

pub fn list_master_options(conn: &Connection, brand_id: &str) -> Result<Vec<MasterOption>> {
    let mut stmt = conn.prepare(
        "SELECT id, brand_id, name, category, created_at, updated_at
         FROM master_options WHERE brand_id = ?1 ORDER BY name",
    )?;
    let masters = stmt
        .query_map(params![brand_id], map_master_option_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(masters)
}

pub fn master_option_vehicle_count(conn: &Connection, master_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(DISTINCT vehicle_id) FROM options WHERE master_id = ?1",
        params![master_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Delete a master option. Same usage guard as [`delete_master_color`].
pub fn delete_master_option(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction()?;

    let master = get_master_option(&tx, id)?;
    let vehicles = master_option_vehicle_count(&tx, id)?;
    if vehicles > 0 {
        return Err(CatalogError::ReferentialIntegrity(format!(
            "master option '{}' is still used by {} vehicle(s)",
            master.name, vehicles
        )));
    }
    tx.execute("DELETE FROM master_options WHERE id = ?1", params![id])?;

    let event = Event::new(
        "master_option_deleted",
        "master_option",
        id,
        serde_json::json!({ "name": master.name }),
        "catalog_admin",
    );
    insert_event(&tx, &event)?;

    tx.commit()?;
    Ok(())
}

/// Find a brand's master option by case-insensitive name, creating it if absent.
pub fn ensure_master_option(
    conn: &Connection,
    brand_id: &str,
    name: &str,
    category: Option<&str>,
) -> Result<MasterOption> {
    let wanted = name.to_lowercase();
    for master in list_master_options(conn, brand_id)? {
        if master.name.to_lowercase() == wanted {
            return Ok(master);
        }
    }
    let mut master = MasterOption::new(brand_id, name);
    master.category = category.map(str::to_string);
    insert_master_option(conn, &master)?;
    Ok(master)
}

// ===== TRIM ELIGIBILITY =====

fn map_trim_color_row(row: &rusqlite::Row) -> rusqlite::Result<TrimColor> {
    Ok(TrimColor {
        id: row.get(0)?,
        trim_id: row.get(1)?,
        color_id: row.get(2)?,
    })
}

fn map_trim_option_row(row: &rusqlite::Row) -> rusqlite::Result<TrimOption> {
    Ok(TrimOption {
        id: row.get(0)?,
        trim_id: row.get(1)?,
        option_id: row.get(2)?,
        price_override: row.get(3)?,
        included: row.get(4)?,
    })
}

/// Mark a color as orderable with a trim. Both must belong to the same vehicle.
/// Linking twice returns the existing row.
pub fn link_trim_color(conn: &Connection, trim_id: &str, color_id: &str) -> Result<TrimColor> {
    let trim = get_trim(conn, trim_id)?;
    let color = get_color(conn, color_id)?;
    if trim.vehicle_id != color.vehicle_id {
        return Err(CatalogError::ReferentialIntegrity(format!(
            "trim '{}' and color '{}' belong to different vehicles",
            trim.name, color.name
        )));
    }

    let mut stmt = conn.prepare(
        "SELECT id, trim_id, color_id FROM trim_colors WHERE trim_id = ?1 AND color_id = ?2",
    )?;
    if let Some(existing) = stmt
        .query_row(params![trim_id, color_id], map_trim_color_row)
        .optional()?
    {
        return Ok(existing);
    }

    let link = TrimColor::new(trim_id, color_id);
    conn.execute(
        "INSERT INTO trim_colors (id, trim_id, color_id) VALUES (?1, ?2, ?3)",
        params![link.id, link.trim_id, link.color_id],
    )?;
    Ok(link)
}

/// Mark an option as orderable with a trim, optionally overriding its price.
/// A NULL override inherits the vehicle-level option price; 0 makes it free.
pub fn link_trim_option(
    conn: &Connection,
    trim_id: &str,
    option_id: &str,
    price_override: Option<i64>,
    included: bool,
) -> Result<TrimOption> {
    let trim = get_trim(conn, trim_id)?;
    let option = get_option(conn, option_id)?;
    if trim.vehicle_id != option.vehicle_id {
        return Err(CatalogError::ReferentialIntegrity(format!(
            "trim '{}' and option '{}' belong to different vehicles",
            trim.name, option.name
        )));
    }

    let mut stmt = conn.prepare(
        "SELECT id, trim_id, option_id, price_override, included
         FROM trim_options WHERE trim_id = ?1 AND option_id = ?2",
    )?;
    if let Some(existing) = stmt
        .query_row(params![trim_id, option_id], map_trim_option_row)
        .optional()?
    {
        return Ok(existing);
    }

    let mut link = TrimOption::new(trim_id, option_id);
    link.price_override = price_override;
    link.included = included;
    conn.execute(
        "INSERT INTO trim_options (id, trim_id, option_id, price_override, included)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            link.id,
            link.trim_id,
            link.option_id,
            link.price_override,
            link.included,
        ],
    )?;
    Ok(link)
}

pub fn trim_color_links(conn: &Connection, trim_id: &str) -> Result<Vec<TrimColor>> {
    let mut stmt =
        conn.prepare("SELECT id, trim_id, color_id FROM trim_colors WHERE trim_id = ?1")?;
    let links = stmt
        .query_map(params![trim_id], map_trim_color_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

pub fn trim_option_links(conn: &Connection, trim_id: &str) -> Result<Vec<TrimOption>> {
    let mut stmt = conn.prepare(
        "SELECT id, trim_id, option_id, price_override, included
         FROM trim_options WHERE trim_id = ?1",
    )?;
    let links = stmt
        .query_map(params![trim_id], map_trim_option_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

pub fn unlink_trim_color(conn: &Connection, link_id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM trim_colors WHERE id = ?1", params![link_id])?;
    if deleted == 0 {
        return Err(CatalogError::not_found("trim color link", link_id));
    }
    Ok(())
}

pub fn unlink_trim_option(conn: &Connection, link_id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM trim_options WHERE id = ?1", params![link_id])?;
    if deleted == 0 {
        return Err(CatalogError::not_found("trim option link", link_id));
    }
    Ok(())
}

// ===== EVENTS =====

/// Append-only audit record for catalog mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        payload: serde_json::Value,
        actor: &str,
    ) -> Self {
        Event {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            payload,
            actor: actor.to_string(),
            timestamp: Utc::now(),
        }
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (event_id, event_type, entity_type, entity_id, payload, actor, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.payload.to_string(),
            event.actor,
            event.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, event_type, entity_type, entity_id, payload, actor, timestamp
         FROM events WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY timestamp DESC",
    )?;
    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let payload_text: String = row.get(4)?;
            let payload =
                serde_json::from_str(&payload_text).map_err(|_| rusqlite::Error::InvalidQuery)?;
            let timestamp: String = row.get(6)?;
            Ok(Event {
                event_id: row.get(0)?,
                event_type: row.get(1)?,
                entity_type: row.get(2)?,
                entity_id: row.get(3)?,
                payload,
                actor: row.get(5)?,
                timestamp: read_timestamp(&timestamp)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(events)
}

// ===== PRICE SHEETS =====

/// One row of an admin price sheet: vehicle name, base price and rate cells.
#[derive(Debug, Clone)]
pub struct SheetVehicle {
    pub name: String,
    pub base_price: i64,
    pub rates: PriceMatrix,
}

/// Load a vehicle price sheet.
///
/// Expected header: `name,basePrice,rentPrice24_0,rentPrice36_0,...`
/// Rate columns the sheet does not carry, and cells that are empty or
/// non-numeric ("-", "consult"), stay absent from the matrix.
pub fn load_vehicle_sheet(path: &Path) -> Result<Vec<SheetVehicle>> {
    let reader = csv::Reader::from_path(path)?;
    read_vehicle_sheet(reader)
}

pub fn load_vehicle_sheet_from_reader<R: Read>(reader: R) -> Result<Vec<SheetVehicle>> {
    read_vehicle_sheet(csv::Reader::from_reader(reader))
}

fn read_vehicle_sheet<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<SheetVehicle>> {
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let mut name = String::new();
        let mut base_price = 0i64;
        let mut rates = PriceMatrix::new();

        for (header, cell) in headers.iter().zip(record.iter()) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            if header == "name" {
                name = cell.to_string();
            } else if header == "basePrice" {
                base_price = cell.parse().unwrap_or(0);
            } else if let Some((period, ratio)) = parse_cell_key(header) {
                if let Ok(amount) = cell.parse::<i64>() {
                    rates.set(period, ratio, amount);
                }
            }
        }

        if name.is_empty() {
            // header occupies line 1
            return Err(CatalogError::InvalidRequest(format!(
                "sheet row {} is missing a vehicle name",
                index + 2
            )));
        }

        rows.push(SheetVehicle {
            name,
            base_price,
            rates,
        });
    }

    Ok(rows)
}

/// Insert sheet rows as vehicles of a brand in one transaction.
/// Rows whose name matches an existing vehicle (case-insensitive) are skipped.
/// Returns the number of vehicles inserted.
pub fn insert_vehicle_sheet(
    conn: &mut Connection,
    brand_id: &str,
    rows: &[SheetVehicle],
) -> Result<usize> {
    let tx = conn.transaction()?;

    let brand = get_brand(&tx, brand_id)?;
    let mut existing: HashSet<String> = list_vehicles_for_brand(&tx, brand_id)?
        .iter()
        .map(|v| v.name.to_lowercase())
        .collect();

    let mut inserted = 0;
    let mut skipped = 0;
    for row in rows {
        let key = row.name.to_lowercase();
        if existing.contains(&key) {
            skipped += 1;
            continue;
        }
        let mut vehicle = Vehicle::new(brand_id, &row.name, row.base_price);
        vehicle.rates = row.rates.clone();
        insert_vehicle(&tx, &vehicle)?;
        existing.insert(key);
        inserted += 1;
    }

    let event = Event::new(
        "vehicle_sheet_imported",
        "brand",
        brand_id,
        serde_json::json!({
            "brand": brand.name,
            "inserted": inserted,
            "skipped": skipped,
        }),
        "sheet_importer",
    );
    insert_event(&tx, &event)?;

    tx.commit()?;

    println!("✓ Imported: {} vehicles", inserted);
    println!("✓ Skipped existing: {}", skipped);

    Ok(inserted)
}

// ===== TESTS =====
