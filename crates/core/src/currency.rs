/// Digits allowed on either side of the decimal point. The SQL guard on `target_to` in
/// `query::filter` enforces the same grammar.
pub const MAX_PART_DIGITS: usize = 15;

/// Parses a currency-formatted price target such as `"$1,250.50"`.
///
/// After trimming ASCII whitespace and dropping commas, the value must read
/// `[$][-]digits[.digits]` (or `[$][-].digits`) with at most [`MAX_PART_DIGITS`] digits per
/// part. Returns `None` for anything else (`"N/A"`, `"$ 150"`, exponents, `inf`).
pub fn parse_currency(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let s = cleaned.strip_prefix('$').unwrap_or(&cleaned);
    let (negative, amount) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (int_part, frac_part) = match amount.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (amount, None),
    };
    let all_digits = |p: &str| p.len() <= MAX_PART_DIGITS && p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.map_or(true, all_digits) {
        return None;
    }
    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return None;
    }

    let value: f64 = amount.parse().ok()?;
    Some(if negative { -value } else { value })
}
