//! Data models for stands, species, and TDA volume tables

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The nine AVI species codes used in field assessments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    WhiteSpruce,
    BlackSpruce,
    Pine,
    BalsamFir,
    DouglasFir,
    Larch,
    Aspen,
    BalsamPoplar,
    WhiteBirch,
}

impl Species {
    pub const ALL: [Species; 9] = [
        Species::WhiteSpruce,
        Species::BlackSpruce,
        Species::Pine,
        Species::BalsamFir,
        Species::DouglasFir,
        Species::Larch,
        Species::Aspen,
        Species::BalsamPoplar,
        Species::WhiteBirch,
    ];

    /// Two-letter AVI code (Pine is the single letter "P")
    pub fn code(self) -> &'static str {
        match self {
            Species::WhiteSpruce => "Sw",
            Species::BlackSpruce => "Sb",
            Species::Pine => "P",
            Species::BalsamFir => "Fb",
            Species::DouglasFir => "Fd",
            Species::Larch => "Lt",
            Species::Aspen => "Aw",
            Species::BalsamPoplar => "Pb",
            Species::WhiteBirch => "Bw",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::WhiteSpruce => "White spruce",
            Species::BlackSpruce => "Black spruce",
            Species::Pine => "Pine",
            Species::BalsamFir => "Balsam fir",
            Species::DouglasFir => "Douglas fir",
            Species::Larch => "Larch",
            Species::Aspen => "Aspen",
            Species::BalsamPoplar => "Balsam poplar",
            Species::WhiteBirch => "White birch",
        }
    }

    pub fn is_conifer(self) -> bool {
        matches!(
            self,
            Species::WhiteSpruce
                | Species::BlackSpruce
                | Species::Pine
                | Species::BalsamFir
                | Species::DouglasFir
                | Species::Larch
        )
    }

    pub fn is_deciduous(self) -> bool {
        !self.is_conifer()
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Species {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Species::ALL
            .iter()
            .copied()
            .find(|sp| sp.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown species code '{s}' (expected one of Sw, Sb, P, Fb, Fd, Lt, Aw, Pb, Bw)")
            })
    }
}

/// Natural region selecting which TDA table applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Boreal,
    Foothills,
}

impl Region {
    pub fn name(self) -> &'static str {
        match self {
            Region::Boreal => "Boreal",
            Region::Foothills => "Foothills",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boreal" => Ok(Region::Boreal),
            "foothills" => Ok(Region::Foothills),
            other => Err(format!("unknown region '{other}' (expected Boreal or Foothills)")),
        }
    }
}

/// One user-supplied stand description
#[derive(Debug, Clone, PartialEq)]
pub struct StandInput {
    pub is_merchantable: bool,
    pub crown_density_pct: u32,
    pub avg_height_m: u32,
    pub dominant_species: Species,
    pub dominant_cover_pct: u32,
    pub secondary_species: Option<Species>,
    pub secondary_cover_pct: u32,
    pub area_ha: f64,
    pub region: Region,
}

/// A domain constraint violated by a [`StandInput`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("crown density {0}% is outside the 6-100% range")]
    CrownDensityRange(u32),
    #[error("average stand height {0} m is outside the 0-40 m range")]
    HeightRange(u32),
    #[error("{which} cover {pct}% must be a multiple of 10 between 0 and 100")]
    CoverPct { which: &'static str, pct: u32 },
    #[error("secondary species must differ from the dominant species")]
    DuplicateSpecies,
    #[error("dominant and secondary cover must sum to 100% (got {0}%)")]
    CoverSum(u32),
    #[error("area must be positive (got {0} ha)")]
    AreaNotPositive(f64),
}

impl StandInput {
    /// Check every domain constraint, rejecting rather than auto-correcting.
    pub fn validate(&self) -> Result<(), InvalidInput> {
        if !(6..=100).contains(&self.crown_density_pct) {
            return Err(InvalidInput::CrownDensityRange(self.crown_density_pct));
        }
        if self.avg_height_m > 40 {
            return Err(InvalidInput::HeightRange(self.avg_height_m));
        }
        if self.dominant_cover_pct > 100 || self.dominant_cover_pct % 10 != 0 {
            return Err(InvalidInput::CoverPct {
                which: "dominant",
                pct: self.dominant_cover_pct,
            });
        }
        if self.secondary_cover_pct > 100 || self.secondary_cover_pct % 10 != 0 {
            return Err(InvalidInput::CoverPct {
                which: "secondary",
                pct: self.secondary_cover_pct,
            });
        }
        if let Some(sec) = self.secondary_species {
            if sec == self.dominant_species {
                return Err(InvalidInput::DuplicateSpecies);
            }
            let sum = self.dominant_cover_pct + self.secondary_cover_pct;
            if sum != 100 {
                return Err(InvalidInput::CoverSum(sum));
            }
        }
        if !(self.area_ha > 0.0) {
            return Err(InvalidInput::AreaNotPositive(self.area_ha));
        }
        Ok(())
    }
}

/// Conifer/deciduous/mixedwood dominance class selecting the TDA column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureGroup {
    Deciduous,
    MixedPine,
    MixedSpruce,
    WhiteSpruce,
    Pine,
    BlackSpruce,
    OtherConifer,
}

impl StructureGroup {
    pub fn label(self) -> &'static str {
        match self {
            StructureGroup::Deciduous => "D",
            StructureGroup::MixedPine => "MX-P",
            StructureGroup::MixedSpruce => "MX-Sx",
            StructureGroup::WhiteSpruce => "C-Sw",
            StructureGroup::Pine => "C-P",
            StructureGroup::BlackSpruce => "C-Sb",
            StructureGroup::OtherConifer => "C-Sx",
        }
    }
}

impl fmt::Display for StructureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Engine output for one stand; immutable once computed
#[derive(Debug, Clone, PartialEq)]
pub struct StandResult {
    pub avi_code: String,
    pub structure_group: Option<StructureGroup>,
    /// Raw TDA table total used for the volume split (m³/ha)
    pub lookup_value: f64,
    /// None means "not applicable", distinct from zero
    pub conifer_vol_per_ha: Option<f64>,
    pub deciduous_vol_per_ha: f64,
    pub conifer_volume_m3: f64,
    pub deciduous_volume_m3: f64,
    pub conifer_loads: f64,
    pub deciduous_loads: f64,
}

impl StandResult {
    /// Zero-filled result used when the TDA table cannot be loaded,
    /// so a batch run can continue in a degraded state.
    pub fn unavailable() -> Self {
        StandResult {
            avi_code: String::new(),
            structure_group: None,
            lookup_value: 0.0,
            conifer_vol_per_ha: None,
            deciduous_vol_per_ha: 0.0,
            conifer_volume_m3: 0.0,
            deciduous_volume_m3: 0.0,
            conifer_loads: 0.0,
            deciduous_loads: 0.0,
        }
    }
}

/// One line of the caller-owned results log
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub input: StandInput,
    pub result: StandResult,
}

/// Session-wide rollup, recomputed on demand from the full results log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub conifer_volume_m3: f64,
    pub conifer_loads: f64,
    pub deciduous_volume_m3: f64,
    pub deciduous_loads: f64,
    /// Cover-percent weighted, not volume weighted
    pub pct_conifer: u32,
    pub pct_deciduous: u32,
    pub spruce_pct: u32,
    pub pine_pct: u32,
    pub other_conifer_pct: u32,
    pub aspen_pct: u32,
    pub other_deciduous_pct: u32,
}

/// One TDA table row: a height/density bucket and its per-group totals
#[derive(Debug, Clone, PartialEq)]
pub struct TdaRow {
    pub height_density: String,
    /// (column name, m³/ha total), e.g. ("Total (C-Sw)", 210.0)
    pub totals: Vec<(String, f64)>,
}

/// A region's TDA reference table, read-only for the process lifetime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TdaTable {
    rows: Vec<TdaRow>,
}

impl TdaTable {
    pub fn from_rows(rows: Vec<TdaRow>) -> Self {
        TdaTable { rows }
    }

    pub fn rows(&self) -> &[TdaRow] {
        &self.rows
    }

    /// Look up a total by bucket label and column name, trimmed-compared.
    /// A missing row or column is None; the engine treats that as zero.
    pub fn lookup(&self, bucket: &str, column: &str) -> Option<f64> {
        let row = self.rows.iter().find(|r| r.height_density.trim() == bucket)?;
        row.totals
            .iter()
            .find(|(name, _)| name.trim() == column)
            .map(|(_, value)| *value)
    }
}
