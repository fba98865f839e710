//! Population counts by region, area, ethnicity, gender and age range.
//!
//! One CSV row per (region, area, ethnicity):
//!
//! ```text
//! Region,Area,Ethnicity,Population,Male,Female,0_4,5_9,...,85_
//! ```
//!
//! Every configured age-range label must appear as a column. Further
//! columns are ignored.

use std::io;
use std::path::Path;

use synthpop_types::AgeRanges;

use crate::error::DemographicsError;

const REGION: &str = "Region";
const AREA: &str = "Area";
const ETHNICITY: &str = "Ethnicity";
const POPULATION: &str = "Population";
const MALE: &str = "Male";
const FEMALE: &str = "Female";

/// Counts for one (region, area, ethnicity) group.
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicRow {
    /// Region name.
    pub region: String,
    /// Area name within the region.
    pub area: String,
    /// Ethnicity group.
    pub ethnicity: String,
    /// Total population of the group.
    pub population: f64,
    /// Male count.
    pub male: f64,
    /// Female count.
    pub female: f64,
    /// Count per configured age range, in age-range order.
    pub ages: Vec<f64>,
}

/// The full demographic table, validated against the age-range sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicsTable {
    age_ranges: AgeRanges,
    rows: Vec<DemographicRow>,
}

impl DemographicsTable {
    /// Load a table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Io`] if the file cannot be opened, or
    /// any error from [`DemographicsTable::from_reader`].
    pub fn from_path(path: &Path, age_ranges: &AgeRanges) -> Result<Self, DemographicsError> {
        let file = std::fs::File::open(path).map_err(|source| DemographicsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, age_ranges)
    }

    /// Parse a table from CSV text.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] for malformed CSV, a missing column, a
    /// count that is not a finite non-negative number, or an empty table.
    pub fn from_reader<R: io::Read>(
        reader: R,
        age_ranges: &AgeRanges,
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

        let region = column(REGION)?;
        let area = column(AREA)?;
        let ethnicity = column(ETHNICITY)?;
        let population = column(POPULATION)?;
        let male = column(MALE)?;
        let female = column(FEMALE)?;
        let age_columns = age_ranges
            .iter()
            .map(|range| column(range.label()).map(|index| (index, range.label())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let row = index.saturating_add(1);
            let text = |col: usize| record.get(col).unwrap_or("");
            let count = |col: usize, name: &str| {
                let value = text(col);
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| DemographicsError::InvalidNumber {
                        row,
                        column: name.to_owned(),
                        value: value.to_owned(),
                    })
            };

            rows.push(DemographicRow {
                region: text(region).to_owned(),
                area: text(area).to_owned(),
                ethnicity: text(ethnicity).to_owned(),
                population: count(population, POPULATION)?,
                male: count(male, MALE)?,
                female: count(female, FEMALE)?,
                ages: age_columns
                    .iter()
                    .map(|&(col, label)| count(col, label))
                    .collect::<Result<Vec<_>, _>>()?,
            });
        }

        if rows.is_empty() {
            return Err(DemographicsError::Empty {
                table: "demographics",
            });
        }
        Ok(Self {
            age_ranges: age_ranges.clone(),
            rows,
        })
    }

    /// The age ranges the age columns follow.
    pub const fn age_ranges(&self) -> &AgeRanges {
        &self.age_ranges
    }

    /// All rows in file order.
    pub fn rows(&self) -> &[DemographicRow] {
        &self.rows
    }

    /// Regions with their summed population, in first-appearance order.
    pub fn regions(&self) -> Vec<(&str, f64)> {
        group_population(self.rows.iter(), |row| row.region.as_str())
    }

    /// Areas of `region` with their summed population, in first-appearance
    /// order.
    pub fn areas(&self, region: &str) -> Vec<(&str, f64)> {
        group_population(
            self.rows.iter().filter(|row| row.region == region),
            |row| row.area.as_str(),
        )
    }

    /// Rows of one area, one per ethnicity.
    pub fn ethnicities<'t>(
        &'t self,
        region: &'t str,
        area: &'t str,
    ) -> impl Iterator<Item = &'t DemographicRow> {
        self.rows
            .iter()
            .filter(move |row| row.region == region && row.area == area)
    }

    /// The row for one (region, area, ethnicity) group.
    pub fn row(&self, region: &str, area: &str, ethnicity: &str) -> Option<&DemographicRow> {
        self.rows
            .iter()
            .find(|row| row.region == region && row.area == area && row.ethnicity == ethnicity)
    }
}

fn group_population<'t, I, K>(rows: I, key: K) -> Vec<(&'t str, f64)>
where
    I: Iterator<Item = &'t DemographicRow>,
    K: Fn(&'t DemographicRow) -> &'t str,
{
    let mut groups: Vec<(&str, f64)> = Vec::new();
    for row in rows {
        let name = key(row);
        match groups.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, total)) => *total += row.population,
            None => groups.push((name, row.population)),
        }
    }
    groups
}
