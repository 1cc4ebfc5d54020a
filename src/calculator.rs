//! AVI code assembly, TDA volume lookup, and entry aggregation

use std::fmt;

use crate::db::{TableError, VolumeTables};
use crate::models::{Entry, Species, StandInput, StandResult, StructureGroup, TdaTable, Totals};

/// Cubic meters per truck load
const LOAD_M3: f64 = 30.0;

/// AVI crown density class letter. Input domain is [6,100].
pub fn density_letter(crown_density_pct: u32) -> char {
    match crown_density_pct {
        6..=30 => 'A',
        31..=50 => 'B',
        51..=70 => 'C',
        _ => 'D',
    }
}

/// Two-band density bucket used by the TDA tables. Coarser than the
/// four-letter AVI class; both granularities are in use deliberately.
fn density_bucket(crown_density_pct: u32) -> &'static str {
    if (6..=50).contains(&crown_density_pct) {
        "AB"
    } else {
        "CD"
    }
}

/// TDA height bucket label. Heights 11-25 get one bucket per meter.
fn height_bucket(avg_height_m: u32) -> String {
    match avg_height_m {
        0..=4 => "0-4".to_string(),
        5..=8 => "5-8".to_string(),
        9..=10 => "9-10".to_string(),
        11..=25 => avg_height_m.to_string(),
        26..=28 => "26-28".to_string(),
        _ => "29+".to_string(),
    }
}

/// Assemble the AVI code: merchantability flag, density class, height,
/// then species/cover pairs. No separators; order matters.
pub fn avi_code(input: &StandInput) -> String {
    let mut code = String::new();
    if input.is_merchantable {
        code.push('m');
    }
    code.push(density_letter(input.crown_density_pct));
    code.push_str(&input.avg_height_m.to_string());
    code.push_str(input.dominant_species.code());
    code.push_str(&(input.dominant_cover_pct / 10).to_string());
    if input.dominant_cover_pct < 100 {
        if let Some(sec) = input.secondary_species {
            code.push_str(sec.code());
            code.push_str(&(input.secondary_cover_pct / 10).to_string());
        }
    }
    code
}

/// Derive the structure group from the cover-weighted conifer/deciduous
/// split. None (neither class dominant) falls back to the "Total (D)"
/// column at lookup time.
pub fn structure_group(
    dominant: Species,
    dominant_pct: u32,
    secondary: Option<Species>,
    secondary_pct: u32,
) -> Option<StructureGroup> {
    let dom_share = |conifer: bool| if dominant.is_conifer() == conifer { dominant_pct } else { 0 };
    let sec_share = |conifer: bool| match secondary {
        Some(sp) if sp.is_conifer() == conifer => secondary_pct,
        _ => 0,
    };
    let t_con = dom_share(true) + sec_share(true);
    let t_dec = dom_share(false) + sec_share(false);

    if t_dec >= 70 {
        return Some(StructureGroup::Deciduous);
    }
    if t_con >= 70 {
        return Some(match dominant {
            Species::WhiteSpruce => StructureGroup::WhiteSpruce,
            Species::Pine => StructureGroup::Pine,
            Species::BlackSpruce => StructureGroup::BlackSpruce,
            _ => StructureGroup::OtherConifer,
        });
    }
    if t_con > 30 && t_dec < 70 {
        return Some(if dominant == Species::Pine {
            StructureGroup::MixedPine
        } else {
            StructureGroup::MixedSpruce
        });
    }
    None
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Compute one stand's AVI code, volumes, and loads. Fails only when the
/// table source does; missing rows or columns degrade to a zero lookup.
pub fn compute(input: &StandInput, tables: &dyn VolumeTables) -> Result<StandResult, TableError> {
    let table = tables.load(input.region)?;
    Ok(compute_with_table(input, &table))
}

/// Pure computation against an already-loaded table
pub fn compute_with_table(input: &StandInput, table: &TdaTable) -> StandResult {
    let avi_code = avi_code(input);
    let key = format!(
        "{} ({})",
        height_bucket(input.avg_height_m),
        density_bucket(input.crown_density_pct)
    );
    let group = structure_group(
        input.dominant_species,
        input.dominant_cover_pct,
        input.secondary_species,
        input.secondary_cover_pct,
    );
    let column = match group {
        Some(g) => format!("Total ({g})"),
        None => "Total (D)".to_string(),
    };
    let lookup_value = table.lookup(&key, &column).unwrap_or(0.0);

    let (conifer_vol_per_ha, deciduous_vol_per_ha) = if input.dominant_cover_pct == 100 {
        // Secondary species is ignored entirely at full dominant cover.
        let con = if input.dominant_species.is_conifer() {
            Some(lookup_value)
        } else {
            None
        };
        let dec = if input.dominant_species.is_deciduous() {
            lookup_value
        } else {
            0.0
        };
        (con, dec)
    } else {
        let dom_share = |conifer: bool| {
            if input.dominant_species.is_conifer() == conifer {
                input.dominant_cover_pct
            } else {
                0
            }
        };
        let sec_share = |conifer: bool| match input.secondary_species {
            Some(sp) if sp.is_conifer() == conifer => input.secondary_cover_pct,
            _ => 0,
        };
        let con_pct = dom_share(true) + sec_share(true);
        let dec_pct = dom_share(false) + sec_share(false);

        let con = if con_pct > 0 {
            Some(round1(con_pct as f64 / 100.0 * lookup_value))
        } else {
            None
        };
        let dec = if dec_pct > 0 {
            round1(dec_pct as f64 / 100.0 * lookup_value)
        } else {
            0.0
        };
        (con, dec)
    };

    let conifer_volume_m3 = match conifer_vol_per_ha {
        Some(per_ha) => round5(per_ha * input.area_ha),
        None => 0.0,
    };
    let deciduous_volume_m3 = round5(deciduous_vol_per_ha * input.area_ha);
    let conifer_loads = round5(conifer_volume_m3 / LOAD_M3);
    let deciduous_loads = round5(deciduous_volume_m3 / LOAD_M3);

    StandResult {
        avi_code,
        structure_group: group,
        lookup_value,
        conifer_vol_per_ha,
        deciduous_vol_per_ha,
        conifer_volume_m3,
        deciduous_volume_m3,
        conifer_loads,
        deciduous_loads,
    }
}

/// Roll up the results log into session totals. Never fails; an empty log
/// yields all-zero totals with every percentage defined as 0.
///
/// Percentages are cover-percent weighted, not volume weighted, and
/// pct_deciduous is the complement of pct_conifer so the pair always sums
/// to exactly 100 for a non-empty log.
pub fn aggregate(entries: &[Entry]) -> Totals {
    let mut totals = Totals::default();
    let mut raw_con: u32 = 0;
    let mut raw_dec: u32 = 0;
    let mut spruce_raw: u32 = 0;
    let mut pine_raw: u32 = 0;
    let mut aspen_raw: u32 = 0;

    for entry in entries {
        totals.conifer_volume_m3 += entry.result.conifer_volume_m3;
        totals.conifer_loads += entry.result.conifer_loads;
        totals.deciduous_volume_m3 += entry.result.deciduous_volume_m3;
        totals.deciduous_loads += entry.result.deciduous_loads;

        let mut tally = |species: Species, pct: u32| {
            if species.is_conifer() {
                raw_con += pct;
            } else {
                raw_dec += pct;
            }
            match species {
                Species::WhiteSpruce | Species::BlackSpruce => spruce_raw += pct,
                Species::Pine => pine_raw += pct,
                Species::Aspen => aspen_raw += pct,
                _ => {}
            }
        };
        tally(entry.input.dominant_species, entry.input.dominant_cover_pct);
        if let Some(sec) = entry.input.secondary_species {
            tally(sec, entry.input.secondary_cover_pct);
        }
    }

    let raw_total = raw_con + raw_dec;
    if raw_total > 0 {
        totals.pct_conifer = pct_of(raw_con, raw_total);
        totals.pct_deciduous = 100 - totals.pct_conifer;
    }
    if raw_con > 0 {
        totals.spruce_pct = pct_of(spruce_raw, raw_con);
        totals.pine_pct = pct_of(pine_raw, raw_con);
        // Forced complement so the three always sum to 100.
        totals.other_conifer_pct = 100 - totals.spruce_pct - totals.pine_pct;
    }
    if raw_dec > 0 {
        totals.aspen_pct = pct_of(aspen_raw, raw_dec);
        totals.other_deciduous_pct = 100 - totals.aspen_pct;
    }
    totals
}

fn pct_of(part: u32, whole: u32) -> u32 {
    (part as f64 / whole as f64 * 100.0).round() as u32
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Final Tally ===")?;
        writeln!(f, "Total C_Vol:  {:.5} m³", self.conifer_volume_m3)?;
        writeln!(f, "Total C_Load: {:.5}", self.conifer_loads)?;
        writeln!(f, "Total D_Vol:  {:.5} m³", self.deciduous_volume_m3)?;
        writeln!(f, "Total D_Load: {:.5}", self.deciduous_loads)?;
        writeln!(f, "% Coniferous: {}%", self.pct_conifer)?;
        writeln!(f, "% Deciduous:  {}%", self.pct_deciduous)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Region, TdaRow};

    fn stand(
        dominant: Species,
        dominant_cover: u32,
        secondary: Option<Species>,
        secondary_cover: u32,
    ) -> StandInput {
        StandInput {
            is_merchantable: true,
            crown_density_pct: 70,
            avg_height_m: 15,
            dominant_species: dominant,
            dominant_cover_pct: dominant_cover,
            secondary_species: secondary,
            secondary_cover_pct: secondary_cover,
            area_ha: 2.0,
            region: Region::Boreal,
        }
    }

    fn table_with(bucket: &str, column: &str, value: f64) -> TdaTable {
        TdaTable::from_rows(vec![TdaRow {
            height_density: bucket.to_string(),
            totals: vec![(column.to_string(), value)],
        }])
    }

    #[test]
    fn density_letter_boundaries() {
        assert_eq!(density_letter(6), 'A');
        assert_eq!(density_letter(30), 'A');
        assert_eq!(density_letter(31), 'B');
        assert_eq!(density_letter(50), 'B');
        assert_eq!(density_letter(51), 'C');
        assert_eq!(density_letter(70), 'C');
        assert_eq!(density_letter(71), 'D');
        assert_eq!(density_letter(100), 'D');
    }

    #[test]
    fn height_bucket_boundaries() {
        assert_eq!(height_bucket(0), "0-4");
        assert_eq!(height_bucket(4), "0-4");
        assert_eq!(height_bucket(5), "5-8");
        assert_eq!(height_bucket(8), "5-8");
        assert_eq!(height_bucket(9), "9-10");
        assert_eq!(height_bucket(10), "9-10");
        assert_eq!(height_bucket(11), "11");
        assert_eq!(height_bucket(25), "25");
        assert_eq!(height_bucket(26), "26-28");
        assert_eq!(height_bucket(28), "26-28");
        assert_eq!(height_bucket(29), "29+");
        assert_eq!(height_bucket(40), "29+");
    }

    #[test]
    fn avi_code_full_cover_ignores_secondary() {
        // Scenario A: mC15Sw10
        let mut input = stand(Species::WhiteSpruce, 100, None, 0);
        assert_eq!(avi_code(&input), "mC15Sw10");
        input.secondary_species = Some(Species::Aspen);
        assert_eq!(avi_code(&input), "mC15Sw10");
    }

    #[test]
    fn avi_code_with_secondary() {
        // Scenario B: mB8P7Aw3
        let mut input = stand(Species::Pine, 70, Some(Species::Aspen), 30);
        input.crown_density_pct = 40;
        input.avg_height_m = 8;
        assert_eq!(avi_code(&input), "mB8P7Aw3");
    }

    #[test]
    fn avi_code_non_merchantable_and_zero_height() {
        let mut input = stand(Species::Aspen, 100, None, 0);
        input.is_merchantable = false;
        input.avg_height_m = 0;
        input.crown_density_pct = 20;
        assert_eq!(avi_code(&input), "A0Aw10");
    }

    #[test]
    fn structure_group_deciduous_dominant() {
        assert_eq!(
            structure_group(Species::Aspen, 70, Some(Species::Pine), 30),
            Some(StructureGroup::Deciduous)
        );
        assert_eq!(
            structure_group(Species::WhiteBirch, 40, Some(Species::Aspen), 60),
            Some(StructureGroup::Deciduous)
        );
    }

    #[test]
    fn structure_group_conifer_dominant_is_species_specific() {
        assert_eq!(
            structure_group(Species::Pine, 70, Some(Species::Aspen), 30),
            Some(StructureGroup::Pine)
        );
        assert_eq!(
            structure_group(Species::WhiteSpruce, 100, None, 0),
            Some(StructureGroup::WhiteSpruce)
        );
        assert_eq!(
            structure_group(Species::BlackSpruce, 80, Some(Species::Aspen), 20),
            Some(StructureGroup::BlackSpruce)
        );
        assert_eq!(
            structure_group(Species::Larch, 70, Some(Species::BalsamFir), 30),
            Some(StructureGroup::OtherConifer)
        );
    }

    #[test]
    fn structure_group_mixedwood() {
        assert_eq!(
            structure_group(Species::Pine, 40, Some(Species::Aspen), 60),
            Some(StructureGroup::MixedPine)
        );
        assert_eq!(
            structure_group(Species::WhiteSpruce, 40, Some(Species::Aspen), 60),
            Some(StructureGroup::MixedSpruce)
        );
    }

    #[test]
    fn structure_group_none_when_neither_dominates() {
        // 30% conifer does not cross the >30 mixedwood threshold.
        assert_eq!(structure_group(Species::Pine, 30, None, 0), None);
    }

    #[test]
    fn compute_full_conifer_cover() {
        // Scenario A: dominant conifer at 100%, deciduous side stays zero.
        let input = stand(Species::WhiteSpruce, 100, None, 0);
        let table = table_with("15 (CD)", "Total (C-Sw)", 210.0);
        let result = compute_with_table(&input, &table);
        assert_eq!(result.avi_code, "mC15Sw10");
        assert_eq!(result.structure_group, Some(StructureGroup::WhiteSpruce));
        assert_eq!(result.lookup_value, 210.0);
        assert_eq!(result.conifer_vol_per_ha, Some(210.0));
        assert_eq!(result.deciduous_vol_per_ha, 0.0);
        assert_eq!(result.conifer_volume_m3, 420.0);
        assert_eq!(result.deciduous_volume_m3, 0.0);
        assert_eq!(result.conifer_loads, 14.0);
        assert_eq!(result.deciduous_loads, 0.0);
    }

    #[test]
    fn compute_full_deciduous_cover_has_no_conifer_share() {
        let input = stand(Species::Aspen, 100, None, 0);
        let table = table_with("15 (CD)", "Total (D)", 150.0);
        let result = compute_with_table(&input, &table);
        assert_eq!(result.conifer_vol_per_ha, None);
        assert_eq!(result.deciduous_vol_per_ha, 150.0);
        assert_eq!(result.conifer_volume_m3, 0.0);
        assert_eq!(result.deciduous_volume_m3, 300.0);
    }

    #[test]
    fn compute_split_cover_rounds_per_hectare_to_one_decimal() {
        let mut input = stand(Species::Pine, 70, Some(Species::Aspen), 30);
        input.crown_density_pct = 40;
        input.avg_height_m = 8;
        input.area_ha = 1.5;
        let table = table_with("5-8 (AB)", "Total (C-P)", 123.4);
        let result = compute_with_table(&input, &table);
        assert_eq!(result.structure_group, Some(StructureGroup::Pine));
        // 0.7 * 123.4 = 86.38 -> 86.4; 0.3 * 123.4 = 37.02 -> 37.0
        assert_eq!(result.conifer_vol_per_ha, Some(86.4));
        assert_eq!(result.deciduous_vol_per_ha, 37.0);
        assert_eq!(result.conifer_volume_m3, 129.6);
        assert_eq!(result.deciduous_volume_m3, 55.5);
        assert_eq!(result.conifer_loads, 4.32);
        assert_eq!(result.deciduous_loads, 1.85);
    }

    #[test]
    fn compute_lookup_miss_degrades_to_zero() {
        let input = stand(Species::WhiteSpruce, 100, None, 0);
        // Row exists but the needed column does not.
        let table = table_with("15 (CD)", "Total (D)", 150.0);
        let result = compute_with_table(&input, &table);
        assert_eq!(result.lookup_value, 0.0);
        assert_eq!(result.conifer_vol_per_ha, Some(0.0));
        assert_eq!(result.conifer_volume_m3, 0.0);

        // No matching row at all.
        let empty = TdaTable::default();
        let result = compute_with_table(&input, &empty);
        assert_eq!(result.lookup_value, 0.0);
        assert_eq!(result.avi_code, "mC15Sw10");
    }

    #[test]
    fn compute_null_group_falls_back_to_total_d_column() {
        let mut input = stand(Species::Pine, 30, None, 0);
        input.crown_density_pct = 40;
        input.avg_height_m = 8;
        let table = table_with("5-8 (AB)", "Total (D)", 60.0);
        let result = compute_with_table(&input, &table);
        assert_eq!(result.structure_group, None);
        assert_eq!(result.lookup_value, 60.0);
        // 30% conifer share of 60.
        assert_eq!(result.conifer_vol_per_ha, Some(18.0));
        assert_eq!(result.deciduous_vol_per_ha, 0.0);
    }

    #[test]
    fn compute_is_idempotent() {
        let input = stand(Species::Pine, 70, Some(Species::Aspen), 30);
        let table = table_with("15 (CD)", "Total (C-P)", 198.7);
        let first = compute_with_table(&input, &table);
        let second = compute_with_table(&input, &table);
        assert_eq!(first, second);
    }

    #[test]
    fn aggregate_empty_log_is_all_zero() {
        // Scenario C: no division error on an empty log.
        let totals = aggregate(&[]);
        assert_eq!(totals, Totals::default());
        assert_eq!(totals.pct_conifer, 0);
        assert_eq!(totals.pct_deciduous, 0);
    }

    #[test]
    fn aggregate_is_cover_weighted_not_volume_weighted() {
        // Scenario D: 30 m³ conifer vs 15 m³ deciduous still splits 50/50
        // because each entry contributes 100 cover points.
        let table = table_with("15 (CD)", "Total (C-P)", 15.0);
        let pine = stand(Species::Pine, 100, None, 0);
        let pine_result = compute_with_table(&pine, &table);
        assert_eq!(pine_result.conifer_volume_m3, 30.0);

        let aspen_table = table_with("15 (CD)", "Total (D)", 7.5);
        let aspen = stand(Species::Aspen, 100, None, 0);
        let aspen_result = compute_with_table(&aspen, &aspen_table);
        assert_eq!(aspen_result.deciduous_volume_m3, 15.0);

        let entries = vec![
            Entry { input: pine, result: pine_result },
            Entry { input: aspen, result: aspen_result },
        ];
        let totals = aggregate(&entries);
        assert_eq!(totals.conifer_volume_m3, 30.0);
        assert_eq!(totals.deciduous_volume_m3, 15.0);
        assert_eq!(totals.pct_conifer, 50);
        assert_eq!(totals.pct_deciduous, 50);
    }

    #[test]
    fn aggregate_percentages_always_sum_to_100() {
        let table = TdaTable::default();
        let entries = vec![
            Entry {
                input: stand(Species::Pine, 70, Some(Species::Aspen), 30),
                result: compute_with_table(&stand(Species::Pine, 70, Some(Species::Aspen), 30), &table),
            },
            Entry {
                input: stand(Species::WhiteSpruce, 100, None, 0),
                result: compute_with_table(&stand(Species::WhiteSpruce, 100, None, 0), &table),
            },
        ];
        let totals = aggregate(&entries);
        // raw_con = 170, raw_dec = 30 -> 85% / 15%
        assert_eq!(totals.pct_conifer, 85);
        assert_eq!(totals.pct_deciduous, 15);
        assert_eq!(totals.pct_conifer + totals.pct_deciduous, 100);
    }

    #[test]
    fn aggregate_conifer_subsplit_sums_to_100() {
        let table = TdaTable::default();
        let inputs = vec![
            stand(Species::WhiteSpruce, 60, Some(Species::Pine), 40),
            stand(Species::Larch, 70, Some(Species::Aspen), 30),
        ];
        let entries: Vec<Entry> = inputs
            .into_iter()
            .map(|input| Entry {
                result: compute_with_table(&input, &table),
                input,
            })
            .collect();
        let totals = aggregate(&entries);
        // raw_con = 170: spruce 60 (35%), pine 40 (24%), other forced to 41%.
        assert_eq!(totals.spruce_pct, 35);
        assert_eq!(totals.pine_pct, 24);
        assert_eq!(totals.other_conifer_pct, 41);
        assert_eq!(totals.spruce_pct + totals.pine_pct + totals.other_conifer_pct, 100);
    }

    #[test]
    fn aggregate_subsplits_zero_when_group_absent() {
        let table = TdaTable::default();
        let input = stand(Species::Aspen, 70, Some(Species::WhiteBirch), 30);
        let entries = vec![Entry {
            result: compute_with_table(&input, &table),
            input,
        }];
        let totals = aggregate(&entries);
        assert_eq!(totals.spruce_pct, 0);
        assert_eq!(totals.pine_pct, 0);
        assert_eq!(totals.other_conifer_pct, 0);
        assert_eq!(totals.aspen_pct, 70);
        assert_eq!(totals.other_deciduous_pct, 30);
    }

    #[test]
    fn compute_uses_provider_and_propagates_table_errors() {
        use crate::db::{SqliteTables, init_schema, upsert_volume};
        use rusqlite::Connection;

        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        upsert_volume(&conn, Region::Boreal, "15 (CD)", "Total (C-Sw)", 210.0).unwrap();
        let tables = SqliteTables::new(&conn);

        let input = stand(Species::WhiteSpruce, 100, None, 0);
        let result = compute(&input, &tables).unwrap();
        assert_eq!(result.conifer_volume_m3, 420.0);

        let mut foothills = input;
        foothills.region = Region::Foothills;
        assert!(compute(&foothills, &tables).is_err());
    }
}
