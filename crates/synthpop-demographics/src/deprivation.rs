//! Area deprivation scores.
//!
//! The table maps an area name to an integer score (for New Zealand, the
//! `NZDep2018` decile). An area missing from the table gets the mean of all
//! scores, rounded to the nearest integer with ties to even.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::DemographicsError;

const AREA_COLUMN: &str = "area";

/// Deprivation score per area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprivationTable {
    scores: BTreeMap<String, i64>,
    mean: i64,
}

impl DeprivationTable {
    /// Load scores from a CSV file with an `area` column and the named
    /// score column.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Io`] if the file cannot be opened, or
    /// any error from [`DeprivationTable::from_reader`].
    pub fn from_path(path: &Path, score_column: &str) -> Result<Self, DemographicsError> {
        let file = std::fs::File::open(path).map_err(|source| DemographicsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, score_column)
    }

    /// Parse scores from CSV text.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] for malformed CSV, a missing column, a
    /// non-integer score, or an empty table.
    pub fn from_reader<R: io::Read>(
        reader: R,
        score_column: &str,
    ) -> Result<Self, DemographicsError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| DemographicsError::MissingColumn {
                    column: name.to_owned(),
                })
        };
        let area_col = column(AREA_COLUMN)?;
        let score_col = column(score_column)?;

        let mut scores = BTreeMap::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let area = record.get(area_col).unwrap_or("");
            let text = record.get(score_col).unwrap_or("");
            let score = text
                .parse::<i64>()
                .map_err(|_e| DemographicsError::InvalidNumber {
                    row: index.saturating_add(1),
                    column: score_column.to_owned(),
                    value: text.to_owned(),
                })?;
            // First occurrence wins, matching a lookup of the first row.
            scores.entry(area.to_owned()).or_insert(score);
        }

        let mean = rounded_mean(scores.values().copied()).ok_or(DemographicsError::Empty {
            table: "deprivation",
        })?;
        Ok(Self { scores, mean })
    }

    /// The recorded score of `area`.
    pub fn score(&self, area: &str) -> Option<i64> {
        self.scores.get(area).copied()
    }

    /// Mean of all scores, rounded to the nearest integer (ties to even).
    pub const fn mean(&self) -> i64 {
        self.mean
    }

    /// The score of `area`, or the rounded mean if the area is unknown.
    pub fn match_deprivation(&self, area: &str) -> i64 {
        self.score(area).unwrap_or_else(|| {
            debug!(area, fallback = self.mean, "area has no deprivation score");
            self.mean
        })
    }

    /// Number of areas with a score.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the table holds no scores.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Integer mean rounded half to even, or `None` for no values.
fn rounded_mean<I: Iterator<Item = i64>>(values: I) -> Option<i64> {
    let (sum, count) = values.fold((0_i64, 0_i64), |(sum, count), v| {
        (sum.saturating_add(v), count.saturating_add(1))
    });
    if count == 0 {
        return None;
    }
    let quotient = sum.checked_div_euclid(count)?;
    let remainder = sum.checked_rem_euclid(count)?;
    let twice = remainder.saturating_mul(2);
    let round_up = twice > count || (twice == count && quotient.rem_euclid(2) != 0);
    Some(if round_up {
        quotient.saturating_add(1)
    } else {
        quotient
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_area_returns_its_score() {
        let csv = "area,NZDep2018\nOtara,10\nKarori,1\n";
        let table = DeprivationTable::from_reader(csv.as_bytes(), "NZDep2018").unwrap();
        assert_eq!(table.match_deprivation("Otara"), 10);
        assert_eq!(table.match_deprivation("Karori"), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_area_falls_back_to_rounded_mean() {
        let csv = "area,NZDep2018\nA,3\nB,4\nC,9\n";
        let table = DeprivationTable::from_reader(csv.as_bytes(), "NZDep2018").unwrap();
        // 16 / 3 = 5.33
        assert_eq!(table.match_deprivation("Nowhere"), 5);
    }

    #[test]
    fn mean_rounds_half_to_even() {
        assert_eq!(rounded_mean([6, 7].into_iter()), Some(6));
        assert_eq!(rounded_mean([7, 8].into_iter()), Some(8));
        assert_eq!(rounded_mean([1, 2, 2].into_iter()), Some(2));
        assert_eq!(rounded_mean(core::iter::empty()), None);
    }

    #[test]
    fn score_column_is_configurable() {
        let csv = "Area,Score,Other\nHill,4,x\n";
        let table = DeprivationTable::from_reader(csv.as_bytes(), "score").unwrap();
        assert_eq!(table.score("Hill"), Some(4));
        assert!(matches!(
            DeprivationTable::from_reader(csv.as_bytes(), "NZDep2018"),
            Err(DemographicsError::MissingColumn { .. })
        ));
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            DeprivationTable::from_reader("area,NZDep2018\n".as_bytes(), "NZDep2018"),
            Err(DemographicsError::Empty { .. })
        ));
    }

    #[test]
    fn shipped_table_falls_back_for_missing_area() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/nz/deprivation.csv");
        let table = DeprivationTable::from_path(&path, "NZDep2018").unwrap();
        assert_eq!(table.score("Timaru"), None);
        assert_eq!(table.match_deprivation("Timaru"), table.mean());
        assert_eq!(table.mean(), 6);
    }
}
