use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result};

use crate::types::{Catalog, Record};

const META_LAST_UPDATED: &str = "last_updated";
const META_COUNT: &str = "count";
const META_DEVICE: &str = "preferred_device";

pub fn init_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            position INTEGER PRIMARY KEY,
            barcode TEXT,
            item_code TEXT,
            item_name TEXT,
            retail_price TEXT,
            net_price TEXT,
            discount_percent TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
        row.get(0)
    })
    .optional()
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

// Catalog cache

/// Replaces the cached catalog as a whole; readers never see half of one.
pub fn save_catalog(conn: &mut Connection, catalog: &Catalog) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM records", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO records
                (position, barcode, item_code, item_name, retail_price, net_price, discount_percent)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (position, r) in catalog.records().iter().enumerate() {
            stmt.execute(rusqlite::params![
                position as i64,
                r.barcode,
                r.item_code,
                r.item_name,
                r.retail_price,
                r.net_price,
                r.discount_percent,
            ])?;
        }
    }
    set_meta(&tx, META_COUNT, &catalog.count().to_string())?;
    match catalog.last_updated {
        Some(at) => set_meta(&tx, META_LAST_UPDATED, &at.to_rfc3339())?,
        None => {
            tx.execute("DELETE FROM meta WHERE key = ?", [META_LAST_UPDATED])?;
        }
    }
    tx.commit()
}

pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare(
        "SELECT barcode, item_code, item_name, retail_price, net_price, discount_percent
         FROM records ORDER BY position",
    )?;
    let record_iter = stmt.query_map([], |row| {
        Ok(Record {
            barcode: row.get(0)?,
            item_code: row.get(1)?,
            item_name: row.get(2)?,
            retail_price: row.get(3)?,
            net_price: row.get(4)?,
            discount_percent: row.get(5)?,
        })
    })?;
    let records = record_iter.collect::<Result<Vec<_>>>()?;

    // An unreadable timestamp only costs the "Updated" label.
    let last_updated = get_meta(conn, META_LAST_UPDATED)?.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| log::warn!("Ignoring cached timestamp {:?}: {}", s, e))
            .ok()
    });

    if let Some(count) = get_meta(conn, META_COUNT)? {
        if count.parse::<usize>().ok() != Some(records.len()) {
            log::warn!(
                "Cache says {} rows but holds {}",
                count,
                records.len()
            );
        }
    }

    Ok(Catalog::new(records, last_updated))
}

// Scanner preference

pub fn get_preferred_device(conn: &Connection) -> Result<Option<String>> {
    get_meta(conn, META_DEVICE)
}

pub fn set_preferred_device(conn: &Connection, device: &str) -> Result<()> {
    set_meta(conn, META_DEVICE, device)
}
