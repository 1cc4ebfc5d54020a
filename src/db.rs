//! TDA reference table storage and access

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;
use thiserror::Error;

use crate::models::{Region, TdaRow, TdaTable};

/// Failure to produce TDA table data for a region. Lookup misses inside a
/// loaded table are not errors; only the table source itself can fail.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("no TDA rows stored for region {0}; run 'import' or 'load-sample' first")]
    MissingRegion(Region),
    #[error("TDA table query failed: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Source of per-region TDA volume tables
pub trait VolumeTables {
    fn load(&self, region: Region) -> Result<TdaTable, TableError>;
}

/// SQLite-backed table source. Tables are static for the session, so each
/// region is read at most once and served from the cache afterwards.
pub struct SqliteTables<'a> {
    conn: &'a Connection,
    cache: RefCell<HashMap<Region, TdaTable>>,
}

impl<'a> SqliteTables<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteTables {
            conn,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl VolumeTables for SqliteTables<'_> {
    fn load(&self, region: Region) -> Result<TdaTable, TableError> {
        if let Some(table) = self.cache.borrow().get(&region) {
            return Ok(table.clone());
        }
        let table = load_table(self.conn, region)?;
        self.cache.borrow_mut().insert(region, table.clone());
        Ok(table)
    }
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- TDA totals in long form: one row per (region, bucket, column)
        CREATE TABLE IF NOT EXISTS tda_rows (
            region TEXT NOT NULL,
            height_density TEXT NOT NULL,
            total_col TEXT NOT NULL,
            volume_m3_ha REAL NOT NULL,
            PRIMARY KEY (region, height_density, total_col)
        );

        CREATE INDEX IF NOT EXISTS idx_tda_rows_region ON tda_rows(region);
        "#,
    )?;
    Ok(())
}

/// Insert or replace one TDA total
pub fn upsert_volume(
    conn: &Connection,
    region: Region,
    height_density: &str,
    total_col: &str,
    volume_m3_ha: f64,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO tda_rows (region, height_density, total_col, volume_m3_ha)
         VALUES (?1, ?2, ?3, ?4)",
        (region.name(), height_density, total_col, volume_m3_ha),
    )?;
    Ok(())
}

/// Clear all TDA data (for re-import)
pub fn clear_tables(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM tda_rows", [])?;
    Ok(())
}

/// Load a full region table, grouping the long-form rows by bucket label.
/// Insertion order is preserved so listings read like the source table.
pub fn load_table(conn: &Connection, region: Region) -> Result<TdaTable, TableError> {
    let mut stmt = conn.prepare(
        "SELECT height_density, total_col, volume_m3_ha
         FROM tda_rows
         WHERE region = ?1
         ORDER BY rowid",
    )?;

    let mut rows: Vec<TdaRow> = Vec::new();
    let mapped = stmt.query_map([region.name()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    for entry in mapped {
        let (height_density, total_col, value) = entry?;
        match rows.iter_mut().find(|r| r.height_density == height_density) {
            Some(row) => row.totals.push((total_col, value)),
            None => rows.push(TdaRow {
                height_density,
                totals: vec![(total_col, value)],
            }),
        }
    }

    if rows.is_empty() {
        return Err(TableError::MissingRegion(region));
    }
    Ok(TdaTable::from_rows(rows))
}
