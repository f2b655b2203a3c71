//! EAN / GTIN identifier validation
//!
//! Feeds deliver identifiers in all shapes: padded with spaces, exported from
//! spreadsheets as floats (`4006381333931.0`) or even in exponent notation.
//! `normalize` coerces them to a canonical digit string and runs the
//! modulo-10 checksum on the result.

/// Weight table for the modulo-10 checksum, aligned to the units end.
const WEIGHTS: [u32; 17] = [3, 1, 3, 1, 3, 1, 3, 1, 3, 1, 3, 1, 3, 1, 3, 1, 3];

/// Shortest identifier we accept (EAN-8).
pub const MIN_DIGITS: usize = 8;

/// Coerce a raw feed value into a validated identifier.
///
/// Returns `None` for anything that is not numeric, too short, too long or
/// fails the checksum. Never panics.
pub fn normalize(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = coerce_integer(&compact)?;
    is_valid(&digits).then_some(digits)
}

/// Checksum test for an identifier made of ASCII digits.
///
/// Surrounding whitespace and leading zeros are ignored, so `" 04006381333931 "`
/// validates the same as `"4006381333931"`.
pub fn is_valid(identifier: &str) -> bool {
    let trimmed = identifier.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let significant = strip_leading_zeros(trimmed);
    if significant.len() < MIN_DIGITS {
        return false;
    }

    let (payload, check) = significant.split_at(significant.len() - 1);
    if payload.len() > WEIGHTS.len() {
        return false;
    }

    let offset = WEIGHTS.len() - payload.len();
    let weighted_sum: u32 = payload
        .bytes()
        .zip(&WEIGHTS[offset..])
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();

    let expected = (10 - weighted_sum % 10) % 10;
    u32::from(check.as_bytes()[0] - b'0') == expected
}

/// Integer text for a numeric value, dropping any fractional part.
fn coerce_integer(value: &str) -> Option<String> {
    let unsigned = value.strip_prefix('+').unwrap_or(value);
    if unsigned.is_empty() {
        return None;
    }

    // Plain decimal text is handled textually so long codes keep every digit.
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if !integer.is_empty()
        && integer.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Some(strip_leading_zeros(integer).to_string());
    }

    // Exponent artifacts such as "4.006381333931E12".
    let parsed: f64 = unsigned.parse().ok()?;
    if !parsed.is_finite() || parsed < 0.0 || parsed >= 1e18 {
        return None;
    }
    Some(format!("{:.0}", parsed.trunc()))
}

fn strip_leading_zeros(digits: &str) -> &str {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() { "0" } else { stripped }
}
