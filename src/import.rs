//! CSV ingest for TDA reference tables and batch stand files
//!
//! TDA tables arrive as `<REGION>_TDA.csv` exports with a
//! `Height_and_Density` label column and one `Total (...)` column per
//! structure group. Stand files are one stand per line:
//!
//! `merch,density,height,dom,dom_cover,sec,sec_cover,area,region`
//!
//! e.g. `yes,40,8,P,70,Aw,30,1.5,Boreal`. Blank lines, `#` comments, and
//! a leading header line are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::db;
use crate::models::{Region, StandInput, TdaRow};

/// Find `<REGION>_TDA.csv` files under a directory
pub fn find_table_files(source_dir: &Path) -> Result<Vec<(Region, PathBuf)>> {
    let name_re = Regex::new(r"(?i)^(boreal|foothills)_tda\.csv$")?;
    let mut files = Vec::new();

    for entry in WalkDir::new(source_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if let Some(cap) = name_re.captures(filename) {
            let region: Region = cap[1].parse().map_err(|e: String| anyhow!(e))?;
            files.push((region, path.to_path_buf()));
        }
    }

    Ok(files)
}

/// Parse TDA CSV content into rows, returning how many data lines were
/// skipped as malformed. A bad line is a diagnostic, not a failure.
pub fn parse_table_csv(content: &str) -> Result<(Vec<TdaRow>, usize)> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().context("TDA file is empty")?;
    let columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
    let label_idx = columns
        .iter()
        .position(|c| c == "Height_and_Density")
        .context("TDA header has no Height_and_Density column")?;

    let mut rows = Vec::new();
    let mut skipped = 0;
    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.len() {
            skipped += 1;
            continue;
        }
        let mut totals = Vec::new();
        let mut bad_value = false;
        for (idx, field) in fields.iter().enumerate() {
            if idx == label_idx {
                continue;
            }
            match field.parse::<f64>() {
                Ok(value) => totals.push((columns[idx].clone(), value)),
                Err(_) => {
                    bad_value = true;
                    break;
                }
            }
        }
        if bad_value {
            skipped += 1;
            continue;
        }
        rows.push(TdaRow {
            height_density: fields[label_idx].to_string(),
            totals,
        });
    }

    Ok((rows, skipped))
}

/// Import all TDA tables found under `source_dir` into the database
pub fn import_to_database(conn: &Connection, source_dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    println!("Scanning {} for TDA tables...", source_dir.display());
    let files = find_table_files(source_dir)?;
    println!("Found {} TDA table file(s)", files.len());

    for (region, path) in &files {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match parse_table_csv(&content) {
            Ok((rows, skipped)) => {
                for row in &rows {
                    for (column, value) in &row.totals {
                        db::upsert_volume(conn, *region, &row.height_density, column, *value)?;
                        stats.values += 1;
                    }
                }
                stats.files += 1;
                stats.rows += rows.len();
                stats.skipped += skipped;
                println!(
                    "  Imported {} ({}): {} row(s), {} skipped",
                    path.display(),
                    region,
                    rows.len(),
                    skipped
                );
            }
            Err(e) => {
                eprintln!("  Error parsing {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub rows: usize,
    pub values: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} file(s): {} rows, {} values. Skipped lines: {}, Errors: {}",
            self.files, self.rows, self.values, self.skipped, self.errors
        )
    }
}

/// Parse one stand line from a batch file
pub fn parse_stand_line(line: &str) -> Result<StandInput> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 9 {
        bail!("expected 9 fields, got {}", fields.len());
    }

    let is_merchantable = match fields[0].to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => true,
        "no" | "n" | "false" => false,
        other => bail!("merchantable flag must be yes/no, got '{other}'"),
    };
    let secondary_species = if fields[5].is_empty() {
        None
    } else {
        Some(fields[5].parse().map_err(|e: String| anyhow!(e))?)
    };

    Ok(StandInput {
        is_merchantable,
        crown_density_pct: fields[1]
            .parse()
            .with_context(|| format!("invalid crown density '{}'", fields[1]))?,
        avg_height_m: fields[2]
            .parse()
            .with_context(|| format!("invalid height '{}'", fields[2]))?,
        dominant_species: fields[3].parse().map_err(|e: String| anyhow!(e))?,
        dominant_cover_pct: fields[4]
            .parse()
            .with_context(|| format!("invalid dominant cover '{}'", fields[4]))?,
        secondary_species,
        secondary_cover_pct: fields[6]
            .parse()
            .with_context(|| format!("invalid secondary cover '{}'", fields[6]))?,
        area_ha: fields[7]
            .parse()
            .with_context(|| format!("invalid area '{}'", fields[7]))?,
        region: fields[8].parse().map_err(|e: String| anyhow!(e))?,
    })
}

/// Read a batch stand file, one [`StandInput`] per line
pub fn read_stand_file(path: &Path) -> Result<Vec<StandInput>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut stands = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        // A header line, if present, starts with the merch column name.
        if lineno == 0 && trimmed.to_ascii_lowercase().starts_with("merch") {
            continue;
        }
        let stand = parse_stand_line(trimmed)
            .with_context(|| format!("{}:{}", path.display(), lineno + 1))?;
        stands.push(stand);
    }
    Ok(stands)
}
