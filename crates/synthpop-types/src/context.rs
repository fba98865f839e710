//! Flat variable maps used to evaluate modifier conditions.
//!
//! A [`Context`] maps a variable name to its string value. Two kinds exist:
//!
//! - the *static* context, built once per patient from demographic
//!   attributes (`region`, `gender`, `deprivation_level`, ...);
//! - *timeline* contexts, one per age range, mapping each resolved module
//!   name to its selected state, plus [`AGE_RANGE_KEY`].
//!
//! Values are stored as text. Numeric comparisons parse them on demand, so
//! the map never guesses types on insertion.

use std::collections::BTreeMap;

/// Key under which a timeline context stores its age-range label.
pub const AGE_RANGE_KEY: &str = "age_range";

/// A mapping of variable name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    /// Create an empty context.
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Start a timeline context for one age range.
    pub fn for_age_range(label: &str) -> Self {
        let mut context = Self::new();
        context.insert(AGE_RANGE_KEY, label);
        context
    }

    /// Set `key` to `value`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variable is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
