//! Field estimation helpers: tree height from growth rates or shadow
//! length, and legal land description (LSD) to P3 map search strings

use anyhow::Result;
use regex::Regex;

use crate::models::Species;

/// Typical annual height growth under good conditions (m/yr)
pub fn growth_rate_m_per_year(species: Species) -> f64 {
    match species {
        Species::Aspen => 0.75,
        Species::BalsamPoplar => 2.0,
        Species::WhiteBirch => 1.0,
        Species::WhiteSpruce | Species::BlackSpruce => 0.45,
        Species::Pine => 0.75,
        Species::BalsamFir | Species::DouglasFir => 0.4,
        Species::Larch => 0.5,
    }
}

/// Height cap applied to growth-based estimates (m)
pub fn max_height_m(species: Species) -> u32 {
    match species {
        Species::WhiteSpruce => 30,
        Species::BlackSpruce => 20,
        Species::Pine => 30,
        Species::BalsamFir => 25,
        Species::DouglasFir => 40,
        Species::Larch => 30,
        Species::Aspen => 25,
        Species::BalsamPoplar => 30,
        Species::WhiteBirch => 20,
    }
}

/// Project a P3 map height forward by the species growth rate. The span is
/// month-resolution; a map date after the as-of date contributes nothing.
pub fn height_from_growth(
    species: Species,
    p3_height_m: u32,
    p3_year: i32,
    p3_month: u32,
    as_of_year: i32,
    as_of_month: u32,
) -> u32 {
    let months = (as_of_year - p3_year) * 12 + as_of_month as i32 - p3_month as i32;
    let years = months.max(0) as f64 / 12.0;
    let estimate = (p3_height_m as f64 + years * growth_rate_m_per_year(species)).round() as u32;
    estimate.min(max_height_m(species))
}

/// Approximate noon sun elevation by month for ~55°N (degrees)
const SUN_ELEVATION_DEG: [f64; 12] = [
    12.0, 20.0, 32.0, 45.0, 55.0, 60.0, 55.0, 45.0, 32.0, 20.0, 12.0, 8.0,
];

/// Tree height from shadow length, assuming flat ground and noon sun.
/// Month is 1-12; returns None for an out-of-range month.
pub fn height_from_shadow(month: u32, shadow_length_m: f64) -> Option<f64> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let elevation = SUN_ELEVATION_DEG[(month - 1) as usize];
    let height = shadow_length_m * elevation.to_radians().tan();
    Some((height * 100.0).round() / 100.0)
}

pub fn sun_elevation_deg(month: u32) -> Option<f64> {
    if (1..=12).contains(&month) {
        Some(SUN_ELEVATION_DEG[(month - 1) as usize])
    } else {
        None
    }
}

/// Convert an LSD like `NE-20-48-11-W5` to the SharePoint P3 map search
/// string `P3:MRRTTT*`. Inputs that do not look like an LSD yield None.
pub fn lsd_to_p3(lsd: &str) -> Result<Option<String>> {
    let pattern = Regex::new(r"(?i)^(?:[A-Za-z]{2}-)?\d{1,2}-\d{1,3}-\d{1,2}-[Ww](\d)$")?;
    let trimmed = lsd.trim();
    let Some(cap) = pattern.captures(trimmed) else {
        return Ok(None);
    };
    let meridian = &cap[1];

    let parts: Vec<&str> = trimmed.split('-').collect();
    let range = parts[parts.len() - 2];
    let township = parts[parts.len() - 3];
    Ok(Some(format!("P3:{meridian}{range:0>2}{township:0>3}*")))
}
