use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;
use tracing::debug;

static SCIENTIFIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+)(?:\.(\d+))?[eE]([+-]?\d+)$").expect("valid regex"));

/// Trim whitespace, a leading BOM, and outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Trimmed text, or `None` when blank.
pub fn normalize_text(raw: &str) -> Option<String> {
    let text = clean_str(raw);
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Fold full-width digits (U+FF10..U+FF19) to ASCII.
fn fold_digit(c: char) -> char {
    match c {
        '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
        _ => c,
    }
}

/// Number of digits left of the decimal point once `int_part.frac_part` is
/// scaled by `10^exponent`. Zero or less means the value is below one.
fn integer_digit_count(int_part: &str, frac_part: &str, exponent: i64) -> i64 {
    let int_len = int_part.trim_start_matches('0').len() as i64;
    if int_len > 0 {
        return int_len.saturating_add(exponent);
    }
    let leading_zeros = (frac_part.len() - frac_part.trim_start_matches('0').len()) as i64;
    exponent.saturating_sub(leading_zeros)
}

/// Expand `1.234567890123E+12` into its integer digits using exact decimal
/// arithmetic. Non-integers, negatives and anything that would not have
/// exactly `expected_len` digits are rejected before expansion.
fn expand_scientific(text: &str, expected_len: usize) -> Option<String> {
    let caps = SCIENTIFIC.captures(text)?;
    let int_part = caps.get(1).map_or("", |m| m.as_str());
    let frac_part = caps.get(2).map_or("", |m| m.as_str());
    let exponent: i64 = caps.get(3)?.as_str().parse().ok()?;

    if integer_digit_count(int_part, frac_part, exponent) != expected_len as i64 {
        debug!(raw = text, expected_len, "scientific value has the wrong magnitude");
        return None;
    }

    let value = BigDecimal::from_str(text).ok()?;
    if value.sign() == bigdecimal::num_bigint::Sign::Minus || !value.is_integer() {
        return None;
    }
    let (digits, _) = value.with_scale(0).as_bigint_and_exponent();
    Some(digits.to_string())
}

/// Digits-only form of `raw`, exactly `expected_len` long.
///
/// Separators such as hyphens and spaces are dropped. Scientific notation
/// (what spreadsheets turn long numbers into) is expanded exactly, never
/// through floating point. Returns `None` for blank input or when the result
/// has the wrong length.
pub fn normalize_digits(raw: &str, expected_len: usize) -> Option<String> {
    let text = clean_str(raw);
    if text.is_empty() {
        return None;
    }
    let folded: String = text.chars().map(fold_digit).collect();

    let digits = if folded.contains(['e', 'E']) {
        if !SCIENTIFIC.is_match(&folded) {
            debug!(raw = text, "not a number in scientific notation");
            return None;
        }
        expand_scientific(&folded, expected_len)?
    } else {
        folded.chars().filter(char::is_ascii_digit).collect()
    };

    if digits.len() != expected_len {
        debug!(
            raw = text,
            digits = %digits,
            expected_len,
            "digit count mismatch"
        );
        return None;
    }
    Some(digits)
}

/// Plain integer, `None` when blank, `Err(())` when not an integer.
pub(crate) fn normalize_int(raw: &str) -> Result<Option<i64>, ()> {
    let text = clean_str(raw);
    if text.is_empty() {
        return Ok(None);
    }
    text.parse().map(Some).map_err(|_| ())
}

/// Boolean flag, `None` when blank, `Err(())` when unrecognized.
pub(crate) fn normalize_flag(raw: &str) -> Result<Option<bool>, ()> {
    match clean_str(raw).to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "t" | "yes" | "y" => Ok(Some(true)),
        "0" | "false" | "f" | "no" | "n" => Ok(Some(false)),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_str_strips_bom_quotes_and_space() {
        assert_eq!(clean_str("  abc "), "abc");
        assert_eq!(clean_str("\u{feff}\"法人番号\""), "法人番号");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn normalize_text_blank_is_none() {
        assert_eq!(normalize_text("   "), None);
        assert_eq!(normalize_text(" 株式会社テスト "), Some("株式会社テスト".into()));
    }

    #[test]
    fn plain_corporate_numbers_pass_through() {
        assert_eq!(
            normalize_digits("1234567890123", 13).as_deref(),
            Some("1234567890123")
        );
        assert_eq!(
            normalize_digits("1234-5678-90123", 13).as_deref(),
            Some("1234567890123")
        );
        assert_eq!(
            normalize_digits("１２３４５６７８９０１２３", 13).as_deref(),
            Some("1234567890123")
        );
    }

    #[test]
    fn scientific_notation_is_exact() {
        assert_eq!(
            normalize_digits("1.234567890123E+12", 13).as_deref(),
            Some("1234567890123")
        );
        assert_eq!(
            normalize_digits("9.999999999999e12", 13).as_deref(),
            Some("9999999999999")
        );
        assert_eq!(
            normalize_digits("7.01E+12", 13).as_deref(),
            Some("7010000000000")
        );
    }

    #[test]
    fn every_thirteen_digit_value_round_trips_through_scientific() {
        for n in [1_000_000_000_000u64, 1_234_567_890_123, 5_010_001_012_345, 9_999_999_999_999] {
            let plain = n.to_string();
            let sci = format!("{}.{}E+12", &plain[..1], &plain[1..]);
            assert_eq!(normalize_digits(&sci, 13).as_deref(), Some(plain.as_str()));
        }
    }

    #[test]
    fn rejects_wrong_length_and_garbage() {
        assert_eq!(normalize_digits("", 13), None);
        assert_eq!(normalize_digits("123", 13), None);
        assert_eq!(normalize_digits("12345678901234", 13), None);
        assert_eq!(normalize_digits("1.5E+0", 13), None);
        assert_eq!(normalize_digits("-1.234567890123E+12", 13), None);
        assert_eq!(normalize_digits("1e", 13), None);
    }

    #[test]
    fn huge_exponents_are_rejected_without_expanding() {
        let start = std::time::Instant::now();
        assert_eq!(normalize_digits("1E+5000000", 13), None);
        assert_eq!(normalize_digits("1.5E-5000000", 13), None);
        assert_eq!(normalize_digits("1E+99999999999999999999999", 13), None);
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn magnitude_counts_leading_zeros() {
        assert_eq!(integer_digit_count("1", "234567890123", 12), 13);
        assert_eq!(integer_digit_count("0", "001", 3), 1);
        assert_eq!(integer_digit_count("007", "", 0), 1);
        assert_eq!(
            normalize_digits("0.1234567890123E+13", 13).as_deref(),
            Some("1234567890123")
        );
    }

    #[test]
    fn postal_codes() {
        assert_eq!(normalize_digits("100-0001", 7).as_deref(), Some("1000001"));
        assert_eq!(normalize_digits("100-001", 7), None);
    }

    #[test]
    fn ints_and_flags() {
        assert_eq!(normalize_int(" 42 "), Ok(Some(42)));
        assert_eq!(normalize_int(""), Ok(None));
        assert_eq!(normalize_int("x"), Err(()));
        assert_eq!(normalize_flag("1"), Ok(Some(true)));
        assert_eq!(normalize_flag("FALSE"), Ok(Some(false)));
        assert_eq!(normalize_flag(""), Ok(None));
        assert_eq!(normalize_flag("maybe"), Err(()));
    }
}
