//! Weighted demographic draws.
//!
//! Each attribute is one weighted draw conditioned on the ones before it:
//! region by total population, area within the region by population,
//! ethnicity within the area by population, then gender and age range from
//! the chosen group's counts. A date of birth is drawn uniformly among the
//! dates that put the patient's age inside the chosen range on the
//! reference date.

use chrono::{Days, Months, NaiveDate};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use synthpop_types::{AgeRange, Demographics};

use crate::deprivation::DeprivationTable;
use crate::error::DemographicsError;
use crate::table::{DemographicRow, DemographicsTable};

/// Gender labels, in the order of the table's `Male`/`Female` columns.
const GENDERS: [&str; 2] = ["Male", "Female"];

/// Draws demographic attributes from a population table.
#[derive(Debug, Clone, Copy)]
pub struct DemographicSampler<'t> {
    table: &'t DemographicsTable,
    deprivation: &'t DeprivationTable,
}

impl<'t> DemographicSampler<'t> {
    /// Create a sampler over shared tables.
    pub const fn new(table: &'t DemographicsTable, deprivation: &'t DeprivationTable) -> Self {
        Self { table, deprivation }
    }

    /// Pick a region, weighted by total population.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] if every region has zero population.
    pub fn select_region<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<&'t str, DemographicsError> {
        let regions = self.table.regions();
        choose("region", "population table", &regions, rng).copied()
    }

    /// Pick an area within `region`, weighted by population.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] if the region has no populated area.
    pub fn select_area<R: Rng + ?Sized>(
        &self,
        region: &str,
        rng: &mut R,
    ) -> Result<&'t str, DemographicsError> {
        let areas = self.table.areas(region);
        choose("area", region, &areas, rng).copied()
    }

    /// Pick an ethnicity within an area, weighted by population.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] if the area has no populated group.
    pub fn select_ethnicity<R: Rng + ?Sized>(
        &self,
        region: &str,
        area: &str,
        rng: &mut R,
    ) -> Result<&'t str, DemographicsError> {
        let groups: Vec<(&str, f64)> = self
            .table
            .rows()
            .iter()
            .filter(|row| row.region == region && row.area == area)
            .map(|row| (row.ethnicity.as_str(), row.population))
            .collect();
        choose("ethnicity", area, &groups, rng).copied()
    }

    /// Pick a gender from the group's male and female counts.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] if the group does not exist or both
    /// counts are zero.
    pub fn select_gender<R: Rng + ?Sized>(
        &self,
        region: &str,
        area: &str,
        ethnicity: &str,
        rng: &mut R,
    ) -> Result<&'static str, DemographicsError> {
        let row = self.group(region, area, ethnicity)?;
        let [male, female] = GENDERS;
        let candidates = [(male, row.male), (female, row.female)];
        choose("gender", ethnicity, &candidates, rng).copied()
    }

    /// Pick an age range from the group's age counts, then a date of birth
    /// whose age on `reference` lies inside that range.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError`] if the group does not exist, all age
    /// counts are zero, or the range cannot be dated.
    pub fn select_age<R: Rng + ?Sized>(
        &self,
        region: &str,
        area: &str,
        ethnicity: &str,
        reference: NaiveDate,
        rng: &mut R,
    ) -> Result<(AgeRange, NaiveDate), DemographicsError> {
        let row = self.group(region, area, ethnicity)?;
        let candidates: Vec<(&AgeRange, f64)> = self
            .table
            .age_ranges()
            .iter()
            .zip(row.ages.iter().copied())
            .collect();
        let age_range = *choose("age range", ethnicity, &candidates, rng)?;
        let dob = date_of_birth(age_range, reference, rng)?;
        Ok((age_range.clone(), dob))
    }

    /// Draw a complete set of demographic attributes.
    ///
    /// # Errors
    ///
    /// Returns the first [`DemographicsError`] from any selection.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        reference: NaiveDate,
        rng: &mut R,
    ) -> Result<Demographics, DemographicsError> {
        let region = self.select_region(rng)?;
        let area = self.select_area(region, rng)?;
        let ethnicity = self.select_ethnicity(region, area, rng)?;
        let gender = self.select_gender(region, area, ethnicity, rng)?;
        let (age_range, dob) = self.select_age(region, area, ethnicity, reference, rng)?;
        let age = reference.years_since(dob).unwrap_or_default();
        Ok(Demographics {
            region: region.to_owned(),
            area: area.to_owned(),
            ethnicity: ethnicity.to_owned(),
            gender: gender.to_owned(),
            age_range,
            dob,
            age,
            deprivation_level: self.deprivation.match_deprivation(area),
        })
    }

    fn group(
        &self,
        region: &str,
        area: &str,
        ethnicity: &str,
    ) -> Result<&'t DemographicRow, DemographicsError> {
        self.table
            .row(region, area, ethnicity)
            .ok_or_else(|| DemographicsError::NoCandidates {
                what: "population group",
                key: format!("{region}/{area}/{ethnicity}"),
            })
    }
}

/// One weighted draw over `(item, weight)` pairs.
fn choose<'c, T, R: Rng + ?Sized>(
    what: &'static str,
    key: &str,
    candidates: &'c [(T, f64)],
    rng: &mut R,
) -> Result<&'c T, DemographicsError> {
    if candidates.is_empty() {
        return Err(DemographicsError::NoCandidates {
            what,
            key: key.to_owned(),
        });
    }
    let distribution = WeightedIndex::new(candidates.iter().map(|(_, weight)| *weight))
        .map_err(|source| DemographicsError::InvalidWeights { what, source })?;
    candidates
        .get(distribution.sample(rng))
        .map(|(item, _)| item)
        .ok_or_else(|| DemographicsError::NoCandidates {
            what,
            key: key.to_owned(),
        })
}

/// A uniformly random date of birth giving an age in `[low, high]` whole
/// years on `reference`.
fn date_of_birth<R: Rng + ?Sized>(
    age_range: &AgeRange,
    reference: NaiveDate,
    rng: &mut R,
) -> Result<NaiveDate, DemographicsError> {
    let out_of_range = || DemographicsError::DateOutOfRange {
        age_range: age_range.label().to_owned(),
        reference,
    };
    let years_before = |years: u32| {
        years
            .checked_mul(12)
            .and_then(|months| reference.checked_sub_months(Months::new(months)))
    };

    // Born on the reference date `low` years ago: just turned `low`.
    let latest = years_before(age_range.low()).ok_or_else(out_of_range)?;
    // Born the day after the reference date `high + 1` years ago: `high`.
    let earliest = age_range
        .high()
        .checked_add(1)
        .and_then(years_before)
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .ok_or_else(out_of_range)?;

    let span = u64::try_from(latest.signed_duration_since(earliest).num_days())
        .map_err(|_e| out_of_range())?;
    earliest
        .checked_add_days(Days::new(rng.random_range(0..=span)))
        .ok_or_else(out_of_range)
}
