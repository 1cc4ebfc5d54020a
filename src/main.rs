//! AVI/TDA Timber Calculator
//!
//! Computes AVI stand classification codes and TDA timber volumes for
//! forestry field assessments, and fills the salvage submission form.

mod calculator;
mod db;
mod estimate;
mod import;
mod models;
mod report;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::SqliteTables;
use crate::models::{Entry, Region, Species, StandInput, StandResult};
use crate::report::{ReportFields, SalvageReport};

#[derive(Parser)]
#[command(name = "avi-calculator")]
#[command(about = "AVI code and TDA timber volume calculator")]
struct Cli {
    /// Path to the SQLite database holding the TDA tables
    #[arg(short, long, default_value = "tda_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the AVI code and volumes for a single stand
    Calc {
        /// Mark the stand as non-merchantable
        #[arg(long)]
        non_merchantable: bool,

        /// Crown density percent (6-100)
        #[arg(long)]
        density: u32,

        /// Average stand tree height in meters (0-40)
        #[arg(long)]
        height: u32,

        /// Dominant species code (Sw, Sb, P, Fb, Fd, Lt, Aw, Pb, Bw)
        #[arg(long)]
        species: Species,

        /// Dominant cover percent, multiple of 10
        #[arg(long, default_value = "100")]
        cover: u32,

        /// Second species code, if any
        #[arg(long)]
        secondary: Option<Species>,

        /// Second species cover percent, multiple of 10
        #[arg(long, default_value = "0")]
        secondary_cover: u32,

        /// Stand area in hectares
        #[arg(long)]
        area: f64,

        /// Natural region (Boreal or Foothills)
        #[arg(long, default_value = "Boreal")]
        region: Region,
    },

    /// Compute a batch stand file and show the final tally
    Batch {
        /// Stand file, one entry per line (see import module docs)
        file: PathBuf,
    },

    /// Compute a batch stand file and render the salvage form
    Report {
        /// Stand file, one entry per line
        file: PathBuf,

        #[arg(long, default_value = "")]
        disposition: String,

        #[arg(long, default_value = "")]
        legal_location: String,

        /// Vegetation type, repeatable (see the form for choices)
        #[arg(long)]
        vegetation: Vec<String>,

        /// Detail for the "Other (specify)" vegetation type
        #[arg(long, default_value = "")]
        other_detail: String,

        /// Disposition number & holder name of FMA
        #[arg(long, default_value = "")]
        fma: String,

        /// No FMA disposition exists
        #[arg(long)]
        no_fma: bool,

        /// Disposition number & holder name of CTLR
        #[arg(long, default_value = "")]
        ctlr: String,

        /// Request a timber salvage waiver
        #[arg(long)]
        waiver: bool,

        /// Waiver justification
        #[arg(long, default_value = "")]
        justification: String,

        /// Write the form here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import <REGION>_TDA.csv tables from a directory
    Import {
        /// Directory to scan for TDA csv files
        source_dir: PathBuf,

        /// Clear existing TDA data before import
        #[arg(long)]
        clear: bool,
    },

    /// List the TDA rows stored for a region
    ListRows {
        region: Region,
    },

    /// Initialize an empty database with the schema
    Init,

    /// Load built-in sample TDA tables (for trying the tool without data)
    LoadSample,

    /// Convert legal land descriptions to P3 map search strings
    Lsd {
        /// LSDs such as NE-20-48-11-W5
        values: Vec<String>,
    },

    /// Estimate current tree height from a P3 map height and growth rate
    EstimateGrowth {
        /// Species code
        #[arg(long)]
        species: Species,

        /// Height shown on the P3 map (m)
        #[arg(long)]
        p3_height: u32,

        /// P3 map update year
        #[arg(long)]
        p3_year: i32,

        /// P3 map update month (1-12)
        #[arg(long, default_value = "1")]
        p3_month: u32,

        /// Assessment year
        #[arg(long, default_value = "2026")]
        as_of_year: i32,

        /// Assessment month (1-12)
        #[arg(long, default_value = "8")]
        as_of_month: u32,
    },

    /// Estimate tree height from shadow length and month
    EstimateShadow {
        /// Image month (1-12)
        #[arg(long)]
        month: u32,

        /// Shadow length (m)
        #[arg(long)]
        shadow_length: f64,

        /// Field-measured height to compare against (m)
        #[arg(long)]
        measured: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Calc {
            non_merchantable,
            density,
            height,
            species,
            cover,
            secondary,
            secondary_cover,
            area,
            region,
        } => {
            let input = StandInput {
                is_merchantable: !non_merchantable,
                crown_density_pct: density,
                avg_height_m: height,
                dominant_species: species,
                dominant_cover_pct: cover,
                secondary_species: secondary,
                secondary_cover_pct: secondary_cover,
                area_ha: area,
                region,
            };
            input.validate()?;

            let tables = SqliteTables::new(&conn);
            let result = calculator::compute(&input, &tables)?;
            print_result(&input, &result);
        }

        Commands::Batch { file } => {
            let entries = compute_batch(&conn, &file)?;
            let totals = calculator::aggregate(&entries);
            println!();
            println!("{totals}");
        }

        Commands::Report {
            file,
            disposition,
            legal_location,
            vegetation,
            other_detail,
            fma,
            no_fma,
            ctlr,
            waiver,
            justification,
            output,
        } => {
            for veg in &vegetation {
                if !report::VEG_TYPES.contains(&veg.as_str()) {
                    eprintln!("Warning: '{veg}' is not a vegetation type on the form");
                }
            }

            let entries = compute_batch(&conn, &file)?;
            let totals = calculator::aggregate(&entries);
            let fields = ReportFields {
                disposition,
                legal_location,
                vegetation,
                other_detail,
                fma_disposition: fma,
                no_fma_disposition: no_fma,
                ctlr_disposition: ctlr,
                merchantable_present: entries.iter().any(|e| e.input.is_merchantable),
                salvage_waiver: waiver,
                justification,
            };
            let form = SalvageReport {
                fields: &fields,
                totals: &totals,
                entries: &entries,
            };

            match output {
                Some(path) => {
                    fs::write(&path, form.to_string())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Report written to {}", path.display());
                }
                None => print!("{form}"),
            }
        }

        Commands::Import { source_dir, clear } => {
            if clear {
                println!("Clearing existing TDA data...");
                db::clear_tables(&conn)?;
            }

            let stats = import::import_to_database(&conn, &source_dir)?;
            println!("\n{}", stats);
        }

        Commands::ListRows { region } => {
            let table = db::load_table(&conn, region)?;
            println!("TDA table for {} ({} rows):", region, table.rows().len());
            for row in table.rows() {
                let totals: Vec<String> = row
                    .totals
                    .iter()
                    .map(|(col, val)| format!("{col}={val}"))
                    .collect();
                println!("  {:<12} {}", row.height_density, totals.join("  "));
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample TDA tables loaded successfully!");
        }

        Commands::Lsd { values } => {
            for value in values.iter().flat_map(|v| v.split_whitespace()) {
                match estimate::lsd_to_p3(value)? {
                    Some(converted) => println!("{converted}"),
                    None => eprintln!("Skipping '{value}': not a recognizable LSD"),
                }
            }
        }

        Commands::EstimateGrowth {
            species,
            p3_height,
            p3_year,
            p3_month,
            as_of_year,
            as_of_month,
        } => {
            let estimated = estimate::height_from_growth(
                species, p3_height, p3_year, p3_month, as_of_year, as_of_month,
            );
            println!(
                "Estimated current height for {} ({}): {} m",
                species.name(),
                species,
                estimated
            );
        }

        Commands::EstimateShadow {
            month,
            shadow_length,
            measured,
        } => {
            let elevation = estimate::sun_elevation_deg(month)
                .context("month must be between 1 and 12")?;
            let estimated = estimate::height_from_shadow(month, shadow_length)
                .context("month must be between 1 and 12")?;
            println!("Sun elevation: {elevation}°");
            println!("Shadow length: {shadow_length} m");
            println!("Estimated height: {estimated:.2} m");
            if let Some(measured) = measured {
                println!("Measured height: {measured} m (Δ {:+.2} m)", measured - estimated);
            }
        }
    }

    Ok(())
}

/// Validate and compute every stand in a batch file. A table failure is
/// reported and the entry kept as zeros so the rest of the run continues.
fn compute_batch(conn: &Connection, file: &std::path::Path) -> Result<Vec<Entry>> {
    let inputs = import::read_stand_file(file)?;
    let tables = SqliteTables::new(conn);

    let mut entries = Vec::new();
    for (idx, input) in inputs.into_iter().enumerate() {
        input
            .validate()
            .with_context(|| format!("entry {} is invalid", idx + 1))?;

        let result = match calculator::compute(&input, &tables) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Entry {}: {}", idx + 1, e);
                StandResult::unavailable()
            }
        };
        println!(
            "Entry {}: {:<12} C_Vol {:.5} m³  D_Vol {:.5} m³  C_Load {:.5}  D_Load {:.5}",
            idx + 1,
            result.avi_code,
            result.conifer_volume_m3,
            result.deciduous_volume_m3,
            result.conifer_loads,
            result.deciduous_loads
        );
        entries.push(Entry { input, result });
    }
    Ok(entries)
}

fn print_result(input: &StandInput, result: &StandResult) {
    let group = result
        .structure_group
        .map(|g| g.label())
        .unwrap_or("N/A");

    println!("Generated AVI Code: {}", result.avi_code);
    println!("Volume per Hectare:");
    match result.conifer_vol_per_ha {
        Some(v) => println!(
            "  Con: {:.5} m³/ha [TDA={}, Group={}]",
            v, result.lookup_value, group
        ),
        None => println!("  Con: N/A"),
    }
    if result.deciduous_vol_per_ha > 0.0 {
        println!(
            "  Dec: {:.5} m³/ha [TDA={}, Group={}]",
            result.deciduous_vol_per_ha, result.lookup_value, group
        );
    } else {
        println!("  Dec: 0");
    }
    println!("Total Volume ({} ha):", input.area_ha);
    println!("  Con: {:.5} m³", result.conifer_volume_m3);
    println!("  Dec: {:.5} m³", result.deciduous_volume_m3);
    println!("Load:");
    println!("  Con: {:.5}", result.conifer_loads);
    println!("  Dec: {:.5}", result.deciduous_loads);
}

/// Column order matches the structure-group labels in the TDA exports
const SAMPLE_COLUMNS: [&str; 7] = [
    "Total (D)",
    "Total (MX-P)",
    "Total (MX-Sx)",
    "Total (C-Sw)",
    "Total (C-P)",
    "Total (C-Sb)",
    "Total (C-Sx)",
];

/// Load small built-in TDA tables so the tool works without field data
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_tables(conn)?;

    // (bucket, totals in SAMPLE_COLUMNS order), m³/ha
    let boreal: [(&str, [f64; 7]); 8] = [
        ("0-4 (AB)", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ("5-8 (AB)", [21.0, 26.0, 24.0, 32.0, 35.0, 22.0, 28.0]),
        ("9-10 (AB)", [44.0, 52.0, 49.0, 63.0, 68.0, 41.0, 55.0]),
        ("15 (AB)", [92.0, 104.0, 99.0, 128.0, 136.0, 84.0, 112.0]),
        ("15 (CD)", [128.0, 147.0, 139.0, 182.0, 193.0, 118.0, 158.0]),
        ("20 (CD)", [176.0, 201.0, 190.0, 246.0, 262.0, 161.0, 214.0]),
        ("26-28 (CD)", [231.0, 263.0, 249.0, 321.0, 341.0, 211.0, 279.0]),
        ("29+ (CD)", [254.0, 289.0, 274.0, 352.0, 374.0, 232.0, 306.0]),
    ];
    let foothills: [(&str, [f64; 7]); 8] = [
        ("0-4 (AB)", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ("5-8 (AB)", [24.0, 30.0, 27.0, 37.0, 40.0, 25.0, 32.0]),
        ("9-10 (AB)", [50.0, 60.0, 56.0, 72.0, 78.0, 47.0, 63.0]),
        ("15 (AB)", [105.0, 119.0, 113.0, 147.0, 156.0, 96.0, 128.0]),
        ("15 (CD)", [147.0, 168.0, 159.0, 209.0, 221.0, 135.0, 181.0]),
        ("20 (CD)", [202.0, 230.0, 218.0, 282.0, 300.0, 185.0, 245.0]),
        ("26-28 (CD)", [265.0, 301.0, 285.0, 368.0, 391.0, 242.0, 320.0]),
        ("29+ (CD)", [291.0, 331.0, 314.0, 403.0, 429.0, 266.0, 351.0]),
    ];

    for (region, rows) in [(Region::Boreal, &boreal), (Region::Foothills, &foothills)] {
        for (bucket, totals) in rows.iter() {
            for (column, value) in SAMPLE_COLUMNS.iter().zip(totals) {
                db::upsert_volume(conn, region, bucket, column, *value)?;
            }
        }
    }

    println!("Loaded {} sample rows per region", boreal.len());
    Ok(())
}
