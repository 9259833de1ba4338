//! Conversion of raw token amounts to display strings.
//!
//! All arithmetic is done on integers or decimal digit strings so that
//! display never depends on floating point rounding.

/// Maximum fractional digits shown.
pub const DISPLAY_PRECISION: usize = 2;

/// Render `raw / 10^decimals` with at most two fractional digits (rounded
/// half-up, trailing zeros trimmed) and `,` thousands grouping.
///
/// ```
/// use lottery_types::amount::format_amount;
/// assert_eq!(format_amount(1_234_567_890, 6), "1,234.57");
/// ```
pub fn format_amount(raw: u128, decimals: u8) -> String {
    let decimals = decimals as usize;
    let digits = format!("{raw:0>width$}", width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);

    let mut kept: Vec<u8> = fraction
        .bytes()
        .take(DISPLAY_PRECISION)
        .map(|b| b - b'0')
        .collect();
    kept.resize(DISPLAY_PRECISION, 0);
    let round_up = fraction
        .as_bytes()
        .get(DISPLAY_PRECISION)
        .is_some_and(|b| *b >= b'5');

    let mut whole = whole.to_string();
    if round_up && !increment_digits(&mut kept) {
        whole = increment_decimal(&whole);
    }

    let mut out = group_thousands(&whole);
    while kept.last() == Some(&0) {
        kept.pop();
    }
    if !kept.is_empty() {
        out.push('.');
        out.extend(kept.iter().map(|d| char::from(b'0' + d)));
    }
    out
}

/// Total price of `quantity` tickets in raw units.
pub fn total_cost(ticket_price_raw: u64, quantity: u64) -> u128 {
    u128::from(ticket_price_raw) * u128::from(quantity)
}

// Adds one to the last digit; returns false when the carry overflows.
fn increment_digits(digits: &mut [u8]) -> bool {
    for digit in digits.iter_mut().rev() {
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            return true;
        }
    }
    false
}

fn increment_decimal(s: &str) -> String {
    let mut digits: Vec<u8> = s.bytes().map(|b| b - b'0').collect();
    if !increment_digits(&mut digits) {
        digits.insert(0, 1);
    }
    digits.into_iter().map(|d| char::from(b'0' + d)).collect()
}

fn group_thousands(whole: &str) -> String {
    let whole = whole.trim_start_matches('0');
    if whole.is_empty() {
        return "0".to_string();
    }
    let mut out = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_whole_and_half_units() {
        assert_eq!(format_amount(0, 6), "0");
        assert_eq!(format_amount(1_000_000, 6), "1");
        assert_eq!(format_amount(1_500_000, 6), "1.5");
        assert_eq!(format_amount(1_250_000, 6), "1.25");
    }

    #[test]
    fn test_rounding() {
        assert_eq!(format_amount(1_234_999, 6), "1.23");
        assert_eq!(format_amount(1_235_000, 6), "1.24");
        assert_eq!(format_amount(999_999_999, 6), "1,000");
        assert_eq!(format_amount(4_999, 6), "0");
        assert_eq!(format_amount(5_000, 6), "0.01");
    }

    #[test]
    fn test_grouping() {
        assert_eq!(format_amount(100_000_000_000_000, 6), "100,000,000");
        assert_eq!(format_amount(1_234_567, 0), "1,234,567");
        assert_eq!(format_amount(123, 0), "123");
    }

    #[test]
    fn test_small_decimals() {
        assert_eq!(format_amount(15, 1), "1.5");
        assert_eq!(format_amount(105, 2), "1.05");
    }

    #[test]
    fn test_extreme_inputs() {
        assert_eq!(format_amount(u128::MAX, 255), "0");
        assert_eq!(
            format_amount(u128::MAX, 0),
            "340,282,366,920,938,463,463,374,607,431,768,211,455"
        );
    }

    #[test]
    fn test_total_cost_formats_after_multiplying() {
        let total = total_cost(2_000_000, 3);
        assert_eq!(total, 6_000_000);
        assert_eq!(format_amount(total, 6), "6");
        assert_eq!(total_cost(u64::MAX, u64::MAX), u128::from(u64::MAX) * u128::from(u64::MAX));
    }

    proptest! {
        /// Whole units render exactly, with grouping removed.
        #[test]
        fn prop_whole_units_exact(units in 0u64..u64::MAX / 1_000_000, decimals in 0u8..12) {
            let raw = u128::from(units) * 10u128.pow(u32::from(decimals));
            let rendered = format_amount(raw, decimals).replace(',', "");
            prop_assert_eq!(rendered, units.to_string());
        }

        /// Output is always a grouped number with at most two decimals.
        #[test]
        fn prop_output_shape(raw in any::<u128>(), decimals in any::<u8>()) {
            let rendered = format_amount(raw, decimals);
            let mut parts = rendered.split('.');
            let whole = parts.next().unwrap();
            prop_assert!(whole.chars().all(|c| c.is_ascii_digit() || c == ','));
            if let Some(fraction) = parts.next() {
                prop_assert!(!fraction.is_empty() && fraction.len() <= DISPLAY_PRECISION);
                prop_assert!(!fraction.ends_with('0'));
            }
            prop_assert!(parts.next().is_none());
        }
    }
}
