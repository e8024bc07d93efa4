//! ISBN normalization and validation (spec §3 invariant 1, §8 boundary
//! behaviors). Canonical form is always ISBN-13: digits and `X` only,
//! uppercase, 10-digit input converted to 13-digit by prepending `978` and
//! recomputing the check digit.

use crate::error::CoreError;

/// Strip separators (hyphens, spaces) and uppercase, keeping only digits and `X`.
fn strip_separators(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'x' || *c == 'X')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn isbn10_check_digit_valid(chars: &[char; 10]) -> bool {
    let mut sum: u32 = 0;
    for (i, c) in chars.iter().enumerate() {
        let value = match c {
            'X' if i == 9 => 10,
            d if d.is_ascii_digit() => d.to_digit(10).unwrap(),
            _ => return false,
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

fn isbn13_check_digit_valid(chars: &[char; 13]) -> bool {
    let mut sum: u32 = 0;
    for (i, c) in chars.iter().enumerate() {
        let Some(d) = c.to_digit(10) else {
            return false;
        };
        let weight = if i % 2 == 0 { 1 } else { 3 };
        sum += d * weight;
    }
    sum % 10 == 0
}

fn compute_isbn13_check_digit(first_twelve: &[char; 12]) -> char {
    let mut sum: u32 = 0;
    for (i, c) in first_twelve.iter().enumerate() {
        let d = c.to_digit(10).unwrap_or(0);
        let weight = if i % 2 == 0 { 1 } else { 3 };
        sum += d * weight;
    }
    let check = (10 - (sum % 10)) % 10;
    char::from_digit(check, 10).unwrap()
}

/// Convert a validated ISBN-10 string (10 chars) to its canonical ISBN-13 form:
/// prepend `978`, drop the original check digit, recompute a fresh one.
fn isbn10_to_isbn13(isbn10: &[char; 10]) -> String {
    let mut twelve = ['9', '7', '8', '0', '0', '0', '0', '0', '0', '0', '0', '0'];
    twelve[3..12].copy_from_slice(&isbn10[0..9]);
    let check = compute_isbn13_check_digit(&twelve);
    let mut out = String::with_capacity(13);
    out.extend(twelve.iter());
    out.push(check);
    out
}

/// Normalize and validate an ISBN, returning its canonical ISBN-13 form.
///
/// Idempotent: `normalize(normalize(x)?)? == normalize(x)?`.
pub fn normalize(input: &str) -> Result<String, CoreError> {
    let stripped = strip_separators(input);
    match stripped.len() {
        10 => {
            let chars: [char; 10] = stripped
                .chars()
                .collect::<Vec<_>>()
                .try_into()
                .map_err(|_| CoreError::InvalidIsbn(input.to_string(), "not 10 ASCII chars"))?;
            if !isbn10_check_digit_valid(&chars) {
                return Err(CoreError::InvalidIsbn(
                    input.to_string(),
                    "invalid ISBN-10 check digit",
                ));
            }
            Ok(isbn10_to_isbn13(&chars))
        }
        13 => {
            let chars: [char; 13] = stripped
                .chars()
                .collect::<Vec<_>>()
                .try_into()
                .map_err(|_| CoreError::InvalidIsbn(input.to_string(), "not 13 ASCII chars"))?;
            if !isbn13_check_digit_valid(&chars) {
                return Err(CoreError::InvalidIsbn(
                    input.to_string(),
                    "invalid ISBN-13 check digit",
                ));
            }
            Ok(chars.iter().collect())
        }
        _ => Err(CoreError::InvalidIsbn(
            input.to_string(),
            "length must be 10 or 13 digits",
        )),
    }
}

/// `true` iff `input` normalizes to a valid canonical ISBN-13.
pub fn is_valid(input: &str) -> bool {
    normalize(input).is_ok()
}
