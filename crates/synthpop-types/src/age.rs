//! Age ranges: the discrete time steps of a patient timeline.
//!
//! Labels follow the `"<low>_<high>"` convention used by the demographic
//! tables (for example `"30_34"`). The oldest bucket is open-ended and
//! written with an empty upper bound (`"85_"`); it is treated as reaching
//! [`OPEN_ENDED_MAX_AGE`].
//!
//! [`AgeRanges`] is the fixed, chronologically ordered sequence every
//! simulation walks through. Its order is the contract: a patient's
//! starting age range is located by position and the engine never skips or
//! reorders entries.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upper age assumed for an open-ended range such as `"85_"`.
pub const OPEN_ENDED_MAX_AGE: u32 = 110;

/// The standard five-year ranges, youngest first.
const STANDARD_RANGES: [(&str, u32, Option<u32>); 18] = [
    ("0_4", 0, Some(4)),
    ("5_9", 5, Some(9)),
    ("10_14", 10, Some(14)),
    ("15_19", 15, Some(19)),
    ("20_24", 20, Some(24)),
    ("25_29", 25, Some(29)),
    ("30_34", 30, Some(34)),
    ("35_39", 35, Some(39)),
    ("40_44", 40, Some(44)),
    ("45_49", 45, Some(49)),
    ("50_54", 50, Some(54)),
    ("55_59", 55, Some(59)),
    ("60_64", 60, Some(64)),
    ("65_69", 65, Some(69)),
    ("70_74", 70, Some(74)),
    ("75_79", 75, Some(79)),
    ("80_84", 80, Some(84)),
    ("85_", 85, None),
];

/// Errors raised while parsing age-range labels or sequences.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgeRangeError {
    /// The label is not of the form `low_high` or `low_`.
    #[error("malformed age range label: {label:?}")]
    Malformed {
        /// The offending label.
        label: String,
    },

    /// The upper bound is below the lower bound.
    #[error("age range {label:?} has upper bound below lower bound")]
    Inverted {
        /// The offending label.
        label: String,
    },

    /// An age-range sequence must contain at least one entry.
    #[error("age range sequence is empty")]
    Empty,

    /// The same label appears twice in a sequence.
    #[error("duplicate age range label: {label:?}")]
    Duplicate {
        /// The repeated label.
        label: String,
    },

    /// A range does not start after the previous one ends.
    #[error("age range {label:?} is out of chronological order")]
    OutOfOrder {
        /// The label that breaks the ordering.
        label: String,
    },
}

/// One chronological bucket, e.g. `"30_34"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgeRange {
    label: String,
    low: u32,
    high: Option<u32>,
}

impl AgeRange {
    /// Parse a label such as `"30_34"` or `"85_"`.
    ///
    /// # Errors
    ///
    /// Returns [`AgeRangeError::Malformed`] if the label does not split into
    /// numeric bounds, or [`AgeRangeError::Inverted`] if `high < low`.
    pub fn parse(label: &str) -> Result<Self, AgeRangeError> {
        let malformed = || AgeRangeError::Malformed {
            label: label.to_owned(),
        };
        let (low, high) = label.trim().split_once('_').ok_or_else(malformed)?;
        let low: u32 = low.parse().map_err(|_e| malformed())?;
        let high = if high.is_empty() {
            None
        } else {
            Some(high.parse::<u32>().map_err(|_e| malformed())?)
        };
        if high.is_some_and(|h| h < low) {
            return Err(AgeRangeError::Inverted {
                label: label.to_owned(),
            });
        }
        Ok(Self {
            label: label.trim().to_owned(),
            low,
            high,
        })
    }

    /// The label exactly as it appears in tables and output.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Youngest age (in whole years) inside the range.
    pub const fn low(&self) -> u32 {
        self.low
    }

    /// Oldest age inside the range; open-ended ranges report
    /// [`OPEN_ENDED_MAX_AGE`].
    pub fn high(&self) -> u32 {
        self.high.unwrap_or(OPEN_ENDED_MAX_AGE).max(self.low)
    }

    /// Whether the range has no declared upper bound.
    pub const fn is_open_ended(&self) -> bool {
        self.high.is_none()
    }

    /// Whether `age` falls inside the range (bounds inclusive).
    pub fn contains(&self, age: u32) -> bool {
        age >= self.low && age <= self.high()
    }
}

impl core::fmt::Display for AgeRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.label)
    }
}

impl FromStr for AgeRange {
    type Err = AgeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AgeRange {
    type Error = AgeRangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AgeRange> for String {
    fn from(range: AgeRange) -> Self {
        range.label
    }
}

/// The fixed, ordered sequence of age ranges, youngest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AgeRanges {
    ranges: Vec<AgeRange>,
}

impl AgeRanges {
    /// Build a sequence, checking it is non-empty, unique and increasing.
    ///
    /// # Errors
    ///
    /// Returns [`AgeRangeError::Empty`], [`AgeRangeError::Duplicate`] or
    /// [`AgeRangeError::OutOfOrder`].
    pub fn new(ranges: Vec<AgeRange>) -> Result<Self, AgeRangeError> {
        if ranges.is_empty() {
            return Err(AgeRangeError::Empty);
        }
        for (i, range) in ranges.iter().enumerate() {
            if ranges
                .iter()
                .take(i)
                .any(|earlier| earlier.label == range.label)
            {
                return Err(AgeRangeError::Duplicate {
                    label: range.label.clone(),
                });
            }
        }
        for pair in ranges.windows(2) {
            if let [previous, next] = pair {
                if previous.is_open_ended() || next.low <= previous.high() {
                    return Err(AgeRangeError::OutOfOrder {
                        label: next.label.clone(),
                    });
                }
            }
        }
        Ok(Self { ranges })
    }

    /// Parse a sequence from labels.
    ///
    /// # Errors
    ///
    /// Returns the first label or ordering error encountered.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, AgeRangeError> {
        let ranges = labels
            .iter()
            .map(|l| AgeRange::parse(l.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ranges)
    }

    /// The eighteen standard five-year ranges `0_4` .. `80_84`, `85_`.
    pub fn standard() -> Self {
        let ranges = STANDARD_RANGES
            .iter()
            .map(|&(label, low, high)| AgeRange {
                label: label.to_owned(),
                low,
                high,
            })
            .collect();
        Self { ranges }
    }

    /// Position of a label in the sequence.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.ranges.iter().position(|r| r.label == label)
    }

    /// Whether the label is part of the sequence.
    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Range at `index`.
    pub fn get(&self, index: usize) -> Option<&AgeRange> {
        self.ranges.get(index)
    }

    /// The range whose bounds contain `age`, if any.
    pub fn find_for_age(&self, age: u32) -> Option<&AgeRange> {
        self.ranges.iter().find(|r| r.contains(age))
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Always false for a validated sequence; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterate youngest to oldest.
    pub fn iter(&self) -> core::slice::Iter<'_, AgeRange> {
        self.ranges.iter()
    }

    /// Borrow the ranges as a slice.
    pub fn as_slice(&self) -> &[AgeRange] {
        &self.ranges
    }
}

impl Default for AgeRanges {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<String>> for AgeRanges {
    type Error = AgeRangeError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_labels(&labels)
    }
}

impl From<AgeRanges> for Vec<String> {
    fn from(ranges: AgeRanges) -> Self {
        ranges.ranges.into_iter().map(String::from).collect()
    }
}

impl<'a> IntoIterator for &'a AgeRanges {
    type Item = &'a AgeRange;
    type IntoIter = core::slice::Iter<'a, AgeRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_closed_range() {
        let range = AgeRange::parse("30_34").unwrap();
        assert_eq!(range.label(), "30_34");
        assert_eq!(range.low(), 30);
        assert_eq!(range.high(), 34);
        assert!(!range.is_open_ended());
        assert!(range.contains(34));
        assert!(!range.contains(35));
    }

    #[test]
    fn parse_open_ended_range() {
        let range = AgeRange::parse("85_").unwrap();
        assert!(range.is_open_ended());
        assert_eq!(range.high(), OPEN_ENDED_MAX_AGE);
        assert!(range.contains(101));
    }

    #[test]
    fn reject_malformed_labels() {
        assert!(matches!(
            AgeRange::parse("thirty"),
            Err(AgeRangeError::Malformed { .. })
        ));
        assert!(matches!(
            AgeRange::parse("_4"),
            Err(AgeRangeError::Malformed { .. })
        ));
        assert!(matches!(
            AgeRange::parse("9_5"),
            Err(AgeRangeError::Inverted { .. })
        ));
    }

    #[test]
    fn standard_sequence_is_valid() {
        let standard = AgeRanges::standard();
        assert_eq!(standard.len(), 18);
        let labels: Vec<String> = standard.iter().map(|r| r.label().to_owned()).collect();
        assert!(AgeRanges::from_labels(&labels).is_ok());
        assert_eq!(standard.position("0_4"), Some(0));
        assert_eq!(standard.position("85_"), Some(17));
        assert_eq!(standard.position("86_90"), None);
    }

    #[test]
    fn sequence_rejects_disorder_and_duplicates() {
        assert_eq!(
            AgeRanges::from_labels(&["5_9", "0_4"]),
            Err(AgeRangeError::OutOfOrder {
                label: String::from("0_4")
            })
        );
        assert!(matches!(
            AgeRanges::from_labels(&["0_4", "0_4"]),
            Err(AgeRangeError::Duplicate { .. })
        ));
        assert!(matches!(
            AgeRanges::from_labels(&["0_", "5_9"]),
            Err(AgeRangeError::OutOfOrder { .. })
        ));
        let empty: [&str; 0] = [];
        assert_eq!(AgeRanges::from_labels(&empty), Err(AgeRangeError::Empty));
    }

    #[test]
    fn find_range_for_age() {
        let standard = AgeRanges::standard();
        assert_eq!(standard.find_for_age(0).map(AgeRange::label), Some("0_4"));
        assert_eq!(standard.find_for_age(42).map(AgeRange::label), Some("40_44"));
        assert_eq!(standard.find_for_age(99).map(AgeRange::label), Some("85_"));
    }

    #[test]
    fn deserialize_sequence_from_yaml() {
        let ranges: AgeRanges = serde_yml::from_str("[0_17, 18_64, 65_]").unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(serde_yml::from_str::<AgeRanges>("[18_64, 0_17]").is_err());
    }
}
