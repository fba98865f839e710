//! Per-module rule tables.
//!
//! Each simulated module (smoking status, diabetes, ...) is described by one
//! CSV table. Every row carries a `type` tag and one number per state:
//!
//! | type | variable | value | Never | Former | Current |
//! |---|---|---|---|---|---|
//! | `InitialProbability` | | `15_19` | 0.80 | 0.05 | 0.15 |
//! | `TransitionProbability` | | | 0.90 | 0.02 | 0.08 |
//! | `TransitionDecay` | | | 1.00 | 1.00 | 0.98 |
//! | `StaticModifier` | `gender` | `Male` | 0.90 | 1.00 | 1.20 |
//! | `DynamicModifier` | `diabetes` | `Type2` | 1.00 | 1.30 | 0.80 |
//!
//! The state columns (everything except `type`, `variable`, `value` and
//! free-text note columns) define the module's ordered state list. Row
//! kinds are decoded once into [`RuleKind`] when the table is loaded; the
//! simulation never re-reads the type strings.
//!
//! Two older naming schemes are accepted as aliases:
//!
//! | kind | `Prior*` tables | lower-case tables |
//! |---|---|---|
//! | `InitialProbability` | `PriorInitialProb` | `initial` |
//! | `TransitionProbability` | `PriorTransProb` | `initial_tran` |
//! | `TransitionDecay` | | `transition` |
//! | `StaticModifier` | `StaticChar` | `characteristics_static` |
//! | `DynamicModifier` | `DynamicChar` | `characteristics_dynamic` |
//!
//! In the lower-case scheme `transition` names the decay multipliers, not
//! the transition matrix.

use std::io;
use std::path::Path;

use crate::amend::ProbabilityMatrix;
use crate::error::ConfigError;

/// Header of the row-kind column.
const TYPE_COLUMN: &str = "type";
/// Header of the modifier variable column.
const VARIABLE_COLUMN: &str = "variable";
/// Header of the comparison value / age-range column.
const VALUE_COLUMN: &str = "value";
/// Free-text columns ignored wherever they appear.
const IGNORED_COLUMNS: [&str; 5] = ["notes", "note", "comment", "comments", "source"];

/// How a modifier compares a context value with its stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    /// `>N`: the context value, read as an integer, exceeds `N`.
    GreaterThan(i64),
    /// `<N`: the context value, read as an integer, is below `N`.
    LessThan(i64),
    /// Verbatim string equality with the stored value.
    Equals(String),
}

/// A numeric comparator met a context value that is not an integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("variable {variable:?} has non-integer value {value:?} for a numeric comparison")]
pub struct ComparisonError {
    /// The variable that was tested.
    pub variable: String,
    /// The context value that failed to parse.
    pub value: String,
}

impl Comparator {
    /// Decode a stored value cell. A leading `>` or `<` selects a numeric
    /// comparator; anything else is compared verbatim.
    ///
    /// Returns `None` when a numeric comparator's threshold is not an
    /// integer.
    pub fn parse(value: &str) -> Option<Self> {
        if let Some(threshold) = value.strip_prefix('>') {
            threshold.trim().parse().ok().map(Self::GreaterThan)
        } else if let Some(threshold) = value.strip_prefix('<') {
            threshold.trim().parse().ok().map(Self::LessThan)
        } else {
            Some(Self::Equals(value.to_owned()))
        }
    }

    /// Test a context value against this comparator.
    ///
    /// # Errors
    ///
    /// Returns [`ComparisonError`] if a numeric comparator meets a value
    /// that is not an integer.
    pub fn holds(&self, variable: &str, value: &str) -> Result<bool, ComparisonError> {
        let numeric = || {
            value.trim().parse::<i64>().map_err(|_e| ComparisonError {
                variable: variable.to_owned(),
                value: value.to_owned(),
            })
        };
        match self {
            Self::GreaterThan(threshold) => Ok(numeric()? > *threshold),
            Self::LessThan(threshold) => Ok(numeric()? < *threshold),
            Self::Equals(expected) => Ok(value == expected),
        }
    }
}

impl core::fmt::Display for Comparator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GreaterThan(n) => write!(f, ">{n}"),
            Self::LessThan(n) => write!(f, "<{n}"),
            Self::Equals(s) => f.write_str(s),
        }
    }
}

/// The test a modifier row applies to a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Context variable to read (a patient attribute or a module name).
    pub variable: String,
    /// How to compare it.
    pub comparator: Comparator,
}

/// Row kind, decoded once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// First-observation probabilities, triggered by an age-range label.
    InitialProbability {
        /// The age range that switches the module on.
        age_range: String,
    },
    /// One row of the state transition matrix (row order = from-state order).
    TransitionProbability,
    /// One row of the per-step decay matrix.
    TransitionDecay,
    /// Multipliers applied once against the patient's static attributes.
    StaticModifier(Condition),
    /// Multipliers applied every step against timeline contexts.
    DynamicModifier(Condition),
}

impl RuleKind {
    /// Canonical name used in tables and diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitialProbability { .. } => "InitialProbability",
            Self::TransitionProbability => "TransitionProbability",
            Self::TransitionDecay => "TransitionDecay",
            Self::StaticModifier(_) => "StaticModifier",
            Self::DynamicModifier(_) => "DynamicModifier",
        }
    }
}

/// One decoded table row.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    /// What the row means.
    pub kind: RuleKind,
    /// One weight or multiplier per state, in state order.
    pub weights: Vec<f64>,
}

/// A conditional multiplier vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    /// When the multipliers apply.
    pub condition: Condition,
    /// One multiplier per state.
    pub multipliers: Vec<f64>,
}

/// An immutable, validated rule table for one module.
///
/// Shared read-only by every patient simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    module: String,
    states: Vec<String>,
    initial: Vec<(String, Vec<f64>)>,
    transition: ProbabilityMatrix,
    decay: ProbabilityMatrix,
    static_modifiers: Vec<Modifier>,
    dynamic_modifiers: Vec<Modifier>,
}

impl RuleTable {
    /// Validate decoded rows and assemble a table.
    ///
    /// `TransitionDecay` rows are optional; without them the table ages its
    /// transition matrix by an all-ones matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the states are empty or repeated, a row has
    /// the wrong number of weights or an invalid weight, an initial or
    /// transition row sums to zero, a required row kind is missing, a matrix
    /// kind does not have one row per state, or an initial age range is
    /// declared twice.
    pub fn new(
        module: impl Into<String>,
        states: Vec<String>,
        rows: Vec<RuleRow>,
    ) -> Result<Self, ConfigError> {
        let module = module.into();
        if states.is_empty() {
            return Err(ConfigError::NoStates { module });
        }
        for (i, state) in states.iter().enumerate() {
            if states.iter().take(i).any(|s| s == state) {
                return Err(ConfigError::DuplicateState {
                    module,
                    state: state.clone(),
                });
            }
        }

        let mut initial: Vec<(String, Vec<f64>)> = Vec::new();
        let mut transition = Vec::new();
        let mut decay = Vec::new();
        let mut static_modifiers = Vec::new();
        let mut dynamic_modifiers = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            let row_number = index.saturating_add(1);
            if row.weights.len() != states.len() {
                return Err(ConfigError::WeightCount {
                    module,
                    row: row_number,
                    expected: states.len(),
                    found: row.weights.len(),
                });
            }
            if let Some(bad) = row.weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(ConfigError::InvalidWeight {
                    module,
                    row: row_number,
                    value: bad.to_string(),
                });
            }
            let is_probability = matches!(
                row.kind,
                RuleKind::InitialProbability { .. } | RuleKind::TransitionProbability
            );
            if is_probability && row.weights.iter().sum::<f64>() <= 0.0 {
                return Err(ConfigError::ZeroRow {
                    module,
                    kind: row.kind.name(),
                    row: row_number,
                });
            }
            match row.kind {
                RuleKind::InitialProbability { age_range } => {
                    if initial.iter().any(|(label, _)| *label == age_range) {
                        return Err(ConfigError::AmbiguousInitialRow { module, age_range });
                    }
                    initial.push((age_range, row.weights));
                }
                RuleKind::TransitionProbability => transition.push(row.weights),
                RuleKind::TransitionDecay => decay.push(row.weights),
                RuleKind::StaticModifier(condition) => static_modifiers.push(Modifier {
                    condition,
                    multipliers: row.weights,
                }),
                RuleKind::DynamicModifier(condition) => dynamic_modifiers.push(Modifier {
                    condition,
                    multipliers: row.weights,
                }),
            }
        }

        if initial.is_empty() {
            return Err(ConfigError::MissingRowKind {
                module,
                kind: "InitialProbability",
            });
        }
        if transition.is_empty() {
            return Err(ConfigError::MissingRowKind {
                module,
                kind: "TransitionProbability",
            });
        }
        if transition.len() != states.len() {
            return Err(ConfigError::MatrixShape {
                module,
                kind: "TransitionProbability",
                expected: states.len(),
                found: transition.len(),
            });
        }
        let decay = if decay.is_empty() {
            ProbabilityMatrix::ones(states.len())
        } else if decay.len() == states.len() {
            ProbabilityMatrix::new(decay)
        } else {
            return Err(ConfigError::MatrixShape {
                module,
                kind: "TransitionDecay",
                expected: states.len(),
                found: decay.len(),
            });
        };

        Ok(Self {
            module,
            states,
            initial,
            transition: ProbabilityMatrix::new(transition),
            decay,
            static_modifiers,
            dynamic_modifiers,
        })
    }

    /// Load a table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be opened, or any
    /// error from [`RuleTable::from_reader`].
    pub fn from_path(module: &str, path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(module, file)
    }

    /// Parse a table from CSV text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed CSV, a missing `type` column,
    /// unknown row kinds, unparseable weights or thresholds, and every
    /// validation failure of [`RuleTable::new`].
    pub fn from_reader<R: io::Read>(module: &str, reader: R) -> Result<Self, ConfigError> {
        let csv_error = |source| ConfigError::Csv {
            module: module.to_owned(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers().map_err(csv_error)?.clone();

        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let type_col = column(TYPE_COLUMN).ok_or_else(|| ConfigError::MissingColumn {
            module: module.to_owned(),
            column: TYPE_COLUMN,
        })?;
        let variable_col = column(VARIABLE_COLUMN);
        let value_col = column(VALUE_COLUMN);

        let state_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|&(i, h)| {
                i != type_col
                    && Some(i) != variable_col
                    && Some(i) != value_col
                    && !IGNORED_COLUMNS.iter().any(|c| h.eq_ignore_ascii_case(c))
            })
            .map(|(i, h)| (i, h.to_owned()))
            .collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let row = index.saturating_add(1);
            let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("");

            let kind_text = cell(Some(type_col));
            let variable = cell(variable_col);
            let value = cell(value_col);
            let kind = decode_kind(module, row, kind_text, variable, value)?;

            let weights = state_cols
                .iter()
                .map(|(col, _)| {
                    let text = cell(Some(*col));
                    text.parse::<f64>().map_err(|_e| ConfigError::InvalidWeight {
                        module: module.to_owned(),
                        row,
                        value: text.to_owned(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(RuleRow { kind, weights });
        }

        let states = state_cols.into_iter().map(|(_, name)| name).collect();
        Self::new(module, states, rows)
    }

    /// Module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Ordered state list.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Index of a state by name.
    pub fn state_index(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| s == state)
    }

    /// Whether an initial-probability row exists for `age_range`.
    pub fn has_initial(&self, age_range: &str) -> bool {
        self.initial.iter().any(|(label, _)| label == age_range)
    }

    /// Age-range labels that carry an initial-probability row.
    pub fn initial_age_ranges(&self) -> impl Iterator<Item = &str> {
        self.initial.iter().map(|(label, _)| label.as_str())
    }

    /// The initial-probability row for `age_range`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoInitialRow`] if no row matches, or
    /// [`ConfigError::AmbiguousInitialRow`] if several do.
    pub fn initial_probabilities(&self, age_range: &str) -> Result<&[f64], ConfigError> {
        let mut matches = self
            .initial
            .iter()
            .filter(|(label, _)| label == age_range)
            .map(|(_, weights)| weights.as_slice());
        match (matches.next(), matches.next()) {
            (Some(weights), None) => Ok(weights),
            (None, _) => Err(ConfigError::NoInitialRow {
                module: self.module.clone(),
                age_range: age_range.to_owned(),
            }),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousInitialRow {
                module: self.module.clone(),
                age_range: age_range.to_owned(),
            }),
        }
    }

    /// Transition matrix as declared (row *i* = transitions out of state *i*).
    pub const fn transition(&self) -> &ProbabilityMatrix {
        &self.transition
    }

    /// Decay matrix, same shape as the transition matrix.
    pub const fn decay(&self) -> &ProbabilityMatrix {
        &self.decay
    }

    /// Static modifiers in table order.
    pub fn static_modifiers(&self) -> &[Modifier] {
        &self.static_modifiers
    }

    /// Dynamic modifiers in table order.
    pub fn dynamic_modifiers(&self) -> &[Modifier] {
        &self.dynamic_modifiers
    }
}

/// Decode the `type`, `variable` and `value` cells of one row.
fn decode_kind(
    module: &str,
    row: usize,
    kind: &str,
    variable: &str,
    value: &str,
) -> Result<RuleKind, ConfigError> {
    let condition = || -> Result<Condition, ConfigError> {
        if variable.is_empty() {
            return Err(ConfigError::MissingVariable {
                module: module.to_owned(),
                row,
            });
        }
        let comparator = Comparator::parse(value).ok_or_else(|| ConfigError::InvalidThreshold {
            module: module.to_owned(),
            row,
            value: value.to_owned(),
        })?;
        Ok(Condition {
            variable: variable.to_owned(),
            comparator,
        })
    };

    match kind {
        "InitialProbability" | "PriorInitialProb" | "initial" => {
            if value.is_empty() {
                return Err(ConfigError::MissingAgeRange {
                    module: module.to_owned(),
                    row,
                });
            }
            Ok(RuleKind::InitialProbability {
                age_range: value.to_owned(),
            })
        }
        "TransitionProbability" | "PriorTransProb" | "initial_tran" => {
            Ok(RuleKind::TransitionProbability)
        }
        "TransitionDecay" | "transition" => Ok(RuleKind::TransitionDecay),
        "StaticModifier" | "StaticChar" | "characteristics_static" => {
            Ok(RuleKind::StaticModifier(condition()?))
        }
        "DynamicModifier" | "DynamicChar" | "characteristics_dynamic" => {
            Ok(RuleKind::DynamicModifier(condition()?))
        }
        other => Err(ConfigError::UnknownRowKind {
            module: module.to_owned(),
            row,
            kind: other.to_owned(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SMOKING: &str = "\
type,variable,value,Never,Former,Current,notes
InitialProbability,,15_19,0.8,0.05,0.15,
InitialProbability,,20_24,0.7,0.1,0.2,
TransitionProbability,,,0.9,0.02,0.08,from Never
TransitionProbability,,,0.0,0.85,0.15,from Former
TransitionProbability,,,0.0,0.2,0.8,from Current
TransitionDecay,,,1,1,1,
TransitionDecay,,,1,1.05,1,
TransitionDecay,,,1,1.1,0.95,
StaticModifier,gender,Male,0.9,1,1.2,
StaticModifier,deprivation_level,>7,0.8,1,1.4,
DynamicModifier,diabetes,Type2,1,1.3,0.8,
";

    fn parse(csv: &str) -> Result<RuleTable, ConfigError> {
        RuleTable::from_reader("smoking", csv.as_bytes())
    }

    #[test]
    fn load_well_formed_table() {
        let table = parse(SMOKING).unwrap();
        assert_eq!(table.module(), "smoking");
        assert_eq!(table.states(), ["Never", "Former", "Current"]);
        assert_eq!(table.transition().len(), 3);
        assert_eq!(table.decay().len(), 3);
        assert_eq!(table.static_modifiers().len(), 2);
        assert_eq!(table.dynamic_modifiers().len(), 1);
        assert_eq!(table.state_index("Current"), Some(2));
        assert!(table.has_initial("15_19"));
        assert!(!table.has_initial("0_4"));
        assert_eq!(table.initial_probabilities("20_24").unwrap(), [0.7, 0.1, 0.2]);
    }

    #[test]
    fn comparators_are_decoded_at_load() {
        let table = parse(SMOKING).unwrap();
        assert_eq!(
            table.static_modifiers()[0].condition.comparator,
            Comparator::Equals(String::from("Male"))
        );
        assert_eq!(
            table.static_modifiers()[1].condition.comparator,
            Comparator::GreaterThan(7)
        );
    }

    #[test]
    fn historical_kind_names_are_accepted() {
        let csv = "\
type,variable,value,No,Yes
PriorInitialProb,,0_4,0.9,0.1
PriorTransProb,,,0.95,0.05
PriorTransProb,,,0,1
StaticChar,ethnicity,Pacific,0.8,1.5
DynamicChar,smoking,Current,0.9,1.4
";
        let table = RuleTable::from_reader("diabetes", csv.as_bytes()).unwrap();
        assert_eq!(table.static_modifiers().len(), 1);
        assert_eq!(table.dynamic_modifiers().len(), 1);
        // No decay rows: ages by the identity multiplier.
        assert_eq!(table.decay(), &ProbabilityMatrix::ones(2));
    }

    #[test]
    fn lower_case_kind_names_are_accepted() {
        let csv = "\
type,variable,value,Never,Current,notes
initial,,15_19,0.7,0.3,
initial_tran,,,0.9,0.1,
initial_tran,,,0.2,0.8,
transition,,,1,0.95,
transition,,,1.1,1,
characteristics_static,gender,Male,0.9,1.2,
characteristics_dynamic,diabetes,Type2,1.3,0.8,
";
        let table = RuleTable::from_reader("smoking", csv.as_bytes()).unwrap();
        assert_eq!(table.initial_probabilities("15_19").unwrap(), [0.7, 0.3]);
        // `initial_tran` is the transition matrix, `transition` the decay.
        assert_eq!(
            table.transition(),
            &ProbabilityMatrix::new(vec![vec![0.9, 0.1], vec![0.2, 0.8]])
        );
        assert_eq!(
            table.decay(),
            &ProbabilityMatrix::new(vec![vec![1.0, 0.95], vec![1.1, 1.0]])
        );
        assert_eq!(table.static_modifiers().len(), 1);
        assert_eq!(table.dynamic_modifiers().len(), 1);
    }

    #[test]
    fn zero_sum_probability_rows_are_rejected_at_load() {
        let transition = "\
type,variable,value,A,B,C
InitialProbability,,0_4,0.5,0.3,0.2
TransitionProbability,,,0.9,0.1,0
TransitionProbability,,,0.1,0.8,0.1
TransitionProbability,,,0,0,0
";
        assert!(matches!(
            RuleTable::from_reader("m", transition.as_bytes()),
            Err(ConfigError::ZeroRow {
                kind: "TransitionProbability",
                row: 4,
                ..
            })
        ));

        let initial = "\
type,variable,value,A,B
InitialProbability,,0_4,0,0
TransitionProbability,,,1,0
TransitionProbability,,,0,1
";
        assert!(matches!(
            RuleTable::from_reader("m", initial.as_bytes()),
            Err(ConfigError::ZeroRow {
                kind: "InitialProbability",
                row: 1,
                ..
            })
        ));

        // Zeroed decay rows and modifiers stay legal.
        let decay = "\
type,variable,value,A,B
InitialProbability,,0_4,1,0
TransitionProbability,,,1,0
TransitionProbability,,,0,1
TransitionDecay,,,1,1
TransitionDecay,,,0,0
StaticModifier,gender,Male,0,0
";
        assert!(RuleTable::from_reader("m", decay.as_bytes()).is_ok());
    }

    #[test]
    fn missing_initial_lookup_fails() {
        let table = parse(SMOKING).unwrap();
        assert!(matches!(
            table.initial_probabilities("0_4"),
            Err(ConfigError::NoInitialRow { .. })
        ));
    }

    #[test]
    fn duplicate_initial_label_is_rejected() {
        let csv = "\
type,variable,value,A,B
InitialProbability,,0_4,0.5,0.5
InitialProbability,,0_4,0.2,0.8
TransitionProbability,,,1,0
TransitionProbability,,,0,1
";
        assert!(matches!(
            RuleTable::from_reader("m", csv.as_bytes()),
            Err(ConfigError::AmbiguousInitialRow { .. })
        ));
    }

    #[test]
    fn transition_rows_must_match_states() {
        let csv = "\
type,variable,value,A,B
InitialProbability,,0_4,0.5,0.5
TransitionProbability,,,1,0
";
        assert!(matches!(
            RuleTable::from_reader("m", csv.as_bytes()),
            Err(ConfigError::MatrixShape {
                kind: "TransitionProbability",
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn decay_rows_must_match_states_when_present() {
        let csv = "\
type,variable,value,A,B
InitialProbability,,0_4,0.5,0.5
TransitionProbability,,,1,0
TransitionProbability,,,0,1
TransitionDecay,,,1,1
";
        assert!(matches!(
            RuleTable::from_reader("m", csv.as_bytes()),
            Err(ConfigError::MatrixShape {
                kind: "TransitionDecay",
                ..
            })
        ));
    }

    #[test]
    fn missing_required_kinds_are_rejected() {
        let no_initial = "\
type,variable,value,A
TransitionProbability,,,1
";
        assert!(matches!(
            RuleTable::from_reader("m", no_initial.as_bytes()),
            Err(ConfigError::MissingRowKind {
                kind: "InitialProbability",
                ..
            })
        ));
        let no_transition = "\
type,variable,value,A
InitialProbability,,0_4,1
";
        assert!(matches!(
            RuleTable::from_reader("m", no_transition.as_bytes()),
            Err(ConfigError::MissingRowKind {
                kind: "TransitionProbability",
                ..
            })
        ));
    }

    #[test]
    fn bad_cells_are_reported_with_row() {
        let unknown = "type,variable,value,A\nSometimes,,,1\n";
        assert!(matches!(
            RuleTable::from_reader("m", unknown.as_bytes()),
            Err(ConfigError::UnknownRowKind { row: 1, .. })
        ));

        let weight = "type,variable,value,A\nInitialProbability,,0_4,abc\n";
        assert!(matches!(
            RuleTable::from_reader("m", weight.as_bytes()),
            Err(ConfigError::InvalidWeight { row: 1, .. })
        ));

        let negative = "type,variable,value,A\nInitialProbability,,0_4,-1\n";
        assert!(matches!(
            RuleTable::from_reader("m", negative.as_bytes()),
            Err(ConfigError::InvalidWeight { .. })
        ));

        let threshold = "type,variable,value,A\nStaticModifier,age,>old,1\n";
        assert!(matches!(
            RuleTable::from_reader("m", threshold.as_bytes()),
            Err(ConfigError::InvalidThreshold { .. })
        ));

        let variable = "type,variable,value,A\nDynamicModifier,,x,1\n";
        assert!(matches!(
            RuleTable::from_reader("m", variable.as_bytes()),
            Err(ConfigError::MissingVariable { .. })
        ));
    }

    #[test]
    fn table_without_type_column_is_rejected() {
        let csv = "kind,A\nInitialProbability,1\n";
        assert!(matches!(
            RuleTable::from_reader("m", csv.as_bytes()),
            Err(ConfigError::MissingColumn { column: "type", .. })
        ));
    }

    #[test]
    fn duplicate_state_columns_are_rejected() {
        let csv = "type,variable,value,A,A\nInitialProbability,,0_4,1,1\n";
        assert!(matches!(
            RuleTable::from_reader("m", csv.as_bytes()),
            Err(ConfigError::DuplicateState { .. })
        ));
    }

    #[test]
    fn comparator_semantics() {
        let gt = Comparator::parse(">7").unwrap();
        assert!(gt.holds("deprivation_level", "8").unwrap());
        assert!(!gt.holds("deprivation_level", "7").unwrap());
        let lt = Comparator::parse("<18").unwrap();
        assert!(lt.holds("age", "17").unwrap());
        assert!(lt.holds("age", "x").is_err());

        // Equality is verbatim: no numeric coercion, no trimming of the stored value.
        let eq = Comparator::parse("7").unwrap();
        assert!(eq.holds("deprivation_level", "7").unwrap());
        assert!(!eq.holds("deprivation_level", "07").unwrap());
        let odd = Comparator::parse("=F").unwrap();
        assert!(!odd.holds("gender", "F").unwrap());
        assert!(odd.holds("gender", "=F").unwrap());
    }
}
