//! Plain-text rendering of the vegetation and timber salvage form

use std::fmt;

use crate::models::{Entry, Totals};

/// Vegetation cover choices offered on the salvage form
pub const VEG_TYPES: [&str; 11] = [
    "Native grassland",
    "Tame pasture",
    "Cropland",
    "Sparsely or non-vegetated",
    "Cutblock - planted",
    "Natural regeneration >2m",
    "Treed wetland",
    "Shrubby wetland",
    "Grass or grass-like wetland",
    "Native aspen parkland",
    "Other (specify)",
];

/// Free-text and checkbox fields supplied alongside the computed totals
#[derive(Debug, Clone, Default)]
pub struct ReportFields {
    pub disposition: String,
    pub legal_location: String,
    pub vegetation: Vec<String>,
    pub other_detail: String,
    pub fma_disposition: String,
    pub no_fma_disposition: bool,
    pub ctlr_disposition: String,
    pub merchantable_present: bool,
    pub salvage_waiver: bool,
    pub justification: String,
}

/// The assembled salvage form; `Display` renders the submission text
pub struct SalvageReport<'a> {
    pub fields: &'a ReportFields,
    pub totals: &'a Totals,
    pub entries: &'a [Entry],
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "☒" } else { "☐" }
}

/// Which coniferous class band a cover-weighted percentage falls into
fn conifer_class_checked(label: &str, pct_con: u32) -> bool {
    match label {
        "D" => pct_con < 30,
        "DC" => (30..50).contains(&pct_con),
        "CD" => (50..=70).contains(&pct_con),
        "C" => pct_con > 70,
        _ => false,
    }
}

/// Volume totals are shown rounded up to one decimal on the form
fn ceil1(value: f64) -> f64 {
    (value * 10.0).ceil() / 10.0
}

impl fmt::Display for SalvageReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields;
        let totals = self.totals;
        let veg = |label: &str| checkbox(fields.vegetation.iter().any(|v| v == label));
        let class = |label: &str| checkbox(conifer_class_checked(label, totals.pct_conifer));

        writeln!(f, "Vegetation and Timber Salvage Information")?;
        writeln!(f, "Disposition: {}", fields.disposition)?;
        writeln!(f, "Legal Land Location: {}", fields.legal_location)?;
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f)?;

        writeln!(f, "Vegetation and Timber Cover")?;
        writeln!(f)?;
        writeln!(f, "Vegetation (check all that apply)")?;
        for pair in [
            ("Native grassland", "Treed wetland"),
            ("Tame pasture", "Shrubby wetland"),
            ("Cropland", "Grass or grass-like wetland"),
            ("Sparsely or non-vegetated", "Native aspen parkland"),
            ("Cutblock - planted", "Other (specify)"),
        ] {
            let (left, right) = pair;
            let mut right_text = format!("{} {}", veg(right), right);
            if right == "Other (specify)"
                && fields.vegetation.iter().any(|v| v == right)
                && !fields.other_detail.is_empty()
            {
                right_text.push_str(": ");
                right_text.push_str(&fields.other_detail);
            }
            writeln!(f, "  {} {:<28} {}", veg(left), left, right_text)?;
        }
        writeln!(f, "  {} Natural regeneration >2m", veg("Natural regeneration >2m"))?;
        writeln!(f)?;

        writeln!(f, "Coniferous class:")?;
        writeln!(f, "  {} D  less than 30% coniferous", class("D"))?;
        writeln!(f, "  {} DC 50% to 30% coniferous", class("DC"))?;
        writeln!(f, "  {} CD 70% to 50% coniferous", class("CD"))?;
        writeln!(f, "  {} C  more than 70% coniferous", class("C"))?;
        writeln!(f)?;

        writeln!(f, "Timber Salvage:")?;
        writeln!(
            f,
            "1.  Merchantable timber present?   {} Yes   {} No",
            checkbox(fields.merchantable_present),
            checkbox(!fields.merchantable_present)
        )?;
        writeln!(f, "    Provide a volume inventory as follows:")?;
        writeln!(
            f,
            "    Coniferous approx. volume: {:.1} m³  or  {:.1} loads",
            ceil1(totals.conifer_volume_m3),
            ceil1(totals.conifer_loads)
        )?;
        writeln!(
            f,
            "    Spruce {}%    Pine {}%    Other {}%",
            totals.spruce_pct, totals.pine_pct, totals.other_conifer_pct
        )?;
        writeln!(
            f,
            "    Deciduous approx. volume: {:.1} m³  or  {:.1} loads",
            ceil1(totals.deciduous_volume_m3),
            ceil1(totals.deciduous_loads)
        )?;
        writeln!(
            f,
            "    Aspen {}%    Other {}%",
            totals.aspen_pct, totals.other_deciduous_pct
        )?;
        writeln!(f)?;

        writeln!(f, "2.  Specify the timber disposition or FMA(s) shown on LSAS:")?;
        writeln!(
            f,
            "    {} No disposition (Contact SRD field office)",
            checkbox(fields.no_fma_disposition)
        )?;
        writeln!(
            f,
            "    Disposition number & Holder name of FMA: {}",
            fields.fma_disposition
        )?;
        writeln!(
            f,
            "    Disposition number & Holder name of CTLR: {}",
            fields.ctlr_disposition
        )?;
        writeln!(f)?;

        writeln!(f, "3.  Utilization Standards:")?;
        writeln!(f, "    Coniferous 15 cm stump diameter to a 11 cm top diameter.")?;
        writeln!(f, "    Deciduous 15 cm stump diameter to a 10 cm top diameter.")?;
        writeln!(f)?;

        writeln!(
            f,
            "4.  Timber salvage waiver requested?   {} Yes   {} No",
            checkbox(fields.salvage_waiver),
            checkbox(!fields.salvage_waiver)
        )?;
        write!(f, "    If 'Yes', provide justification: ")?;
        if fields.salvage_waiver {
            writeln!(f, "{}", fields.justification)?;
        } else {
            writeln!(f)?;
        }

        if !self.entries.is_empty() {
            writeln!(f)?;
            writeln!(f, "Stand inventory:")?;
            writeln!(
                f,
                "  {:<4} {:<12} {:>10} {:>12} {:>12} {:>10} {:>10}",
                "#", "AVI", "Area (ha)", "C_Vol (m³)", "D_Vol (m³)", "C_Load", "D_Load"
            )?;
            for (idx, entry) in self.entries.iter().enumerate() {
                writeln!(
                    f,
                    "  {:<4} {:<12} {:>10.4} {:>12.5} {:>12.5} {:>10.5} {:>10.5}",
                    idx + 1,
                    entry.result.avi_code,
                    entry.input.area_ha,
                    entry.result.conifer_volume_m3,
                    entry.result.deciduous_volume_m3,
                    entry.result.conifer_loads,
                    entry.result.deciduous_loads
                )?;
            }
        }

        Ok(())
    }
}
