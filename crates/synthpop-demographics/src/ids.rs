//! Patient identifier generators.
//!
//! Two formats are supported:
//!
//! - New Zealand National Health Index (NHI) style, `AAANNNC`: three letters
//!   from an alphabet without `I` and `O`, three digits, and a mod-11 check
//!   digit. Letter values are their alphabet position plus one, weighted
//!   7, 6, 5; digits are weighted 4, 3, 2. A checksum of zero has no valid
//!   check digit and the draw is repeated; a check value of 10 is written
//!   as `0`.
//! - Seven random decimal digits.

use rand::Rng;
use synthpop_types::PatientId;

/// NHI letters (no `I` or `O`).
const NHI_ALPHABET: &[u8; 24] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LETTER_WEIGHTS: [u32; 3] = [7, 6, 5];
const DIGIT_WEIGHTS: [u32; 3] = [4, 3, 2];
const NUMERIC_ID_LENGTH: usize = 7;

/// Source of fresh patient identifiers.
pub trait IdGenerator {
    /// Draw one identifier.
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> PatientId;
}

/// Generates checksum-valid NHI identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NhiGenerator;

impl IdGenerator for NhiGenerator {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> PatientId {
        loop {
            let mut id = String::with_capacity(NUMERIC_ID_LENGTH);
            for _ in 0..3 {
                let index = rng.random_range(0..NHI_ALPHABET.len());
                if let Some(&letter) = NHI_ALPHABET.get(index) {
                    id.push(char::from(letter));
                }
            }
            for _ in 0..3 {
                if let Some(digit) = char::from_digit(rng.random_range(0..10), 10) {
                    id.push(digit);
                }
            }
            if let Some(check) = check_digit(&id).and_then(|d| char::from_digit(d, 10)) {
                id.push(check);
                return PatientId::new(id);
            }
        }
    }
}

/// Generates seven-digit numeric identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericIdGenerator;

impl IdGenerator for NumericIdGenerator {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> PatientId {
        let id: String = (0..NUMERIC_ID_LENGTH)
            .filter_map(|_| char::from_digit(rng.random_range(0..10), 10))
            .collect();
        PatientId::new(id)
    }
}

/// Check digit for a six-character `AAANNN` prefix, or `None` if the prefix
/// is malformed or its checksum is zero.
pub fn check_digit(prefix: &str) -> Option<u32> {
    let chars: Vec<char> = prefix.chars().collect();
    let [a, b, c, d, e, f] = chars.as_slice() else {
        return None;
    };
    let letters = [*a, *b, *c]
        .into_iter()
        .zip(LETTER_WEIGHTS)
        .map(|(letter, weight)| letter_value(letter).map(|v| v.saturating_mul(weight)))
        .sum::<Option<u32>>()?;
    let digits = [*d, *e, *f]
        .into_iter()
        .zip(DIGIT_WEIGHTS)
        .map(|(digit, weight)| digit.to_digit(10).map(|v| v.saturating_mul(weight)))
        .sum::<Option<u32>>()?;

    let checksum = letters.saturating_add(digits).rem_euclid(11);
    if checksum == 0 {
        return None;
    }
    match 11_u32.saturating_sub(checksum) {
        10 => Some(0),
        check => Some(check),
    }
}

/// Whether `id` is a well-formed NHI with a correct check digit.
pub fn validate_nhi(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(last) = chars.next_back() else {
        return false;
    };
    let prefix = chars.as_str();
    match (check_digit(prefix), last.to_digit(10)) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

fn letter_value(letter: char) -> Option<u32> {
    let position = NHI_ALPHABET
        .iter()
        .position(|&b| char::from(b) == letter)?;
    u32::try_from(position).ok().map(|p| p.saturating_add(1))
}
