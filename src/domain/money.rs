use std::fmt;

/// Money is kept as integer minor units (paise) so ledger arithmetic is exact.
/// ₹50.00 is stored as 5000.
pub type Cents = i64;

/// Largest magnitude a single money field may carry: ₹10,000,000,000.00.
/// Sums over any realistic ledger stay far inside `i64` at this bound.
pub const MAX_AMOUNT: Cents = 1_000_000_000_000;

/// What is wrong with `amount` as the value of `field`, if anything.
/// Money fields must be non-negative and at most [`MAX_AMOUNT`].
pub fn amount_problem(field: &str, amount: Cents) -> Option<String> {
    if amount < 0 {
        Some(format!("{} must not be negative", field))
    } else if amount > MAX_AMOUNT {
        Some(format!("{} must not exceed {}", field, format_cents(MAX_AMOUNT)))
    } else {
        None
    }
}

/// Format minor units as a decimal string.
/// Example: 500000 -> "5000.00", -20000 -> "-200.00"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal amount into minor units.
/// Accepts "50", "50.5", "50.05" and ".75"; digits past the second decimal
/// place are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    if digits.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    if fraction_str.contains('.') {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => parse_digits(fraction_str)? * 10,
        _ => parse_digits(&fraction_str[..2])?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .filter(|c| *c <= MAX_AMOUNT)
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

/// Parse an amount that must not be negative (income, expenses, costs).
pub fn parse_non_negative_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let cents = parse_cents(input)?;
    if cents < 0 {
        return Err(ParseCentsError::Negative);
    }
    Ok(cents)
}

fn parse_digits(s: &str) -> Result<i64, ParseCentsError> {
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }
    s.parse().map_err(|_| ParseCentsError::InvalidFormat)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    Empty,
    InvalidFormat,
    Negative,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::Empty => write!(f, "amount is empty"),
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Negative => write!(f, "amount must not be negative"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(500000), "5000.00");
        assert_eq!(format_cents(1205), "12.05");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-20000), "-200.00");
        assert_eq!(format_cents(-7), "-0.07");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("5000"), Ok(500000));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents("12.05"), Ok(1205));
        assert_eq!(parse_cents(".75"), Ok(75));
        assert_eq!(parse_cents("-200"), Ok(-20000));
        assert_eq!(parse_cents("1.239"), Ok(123));
    }

    #[test]
    fn test_amount_bounds() {
        assert_eq!(amount_problem("fuel", 0), None);
        assert_eq!(amount_problem("fuel", MAX_AMOUNT), None);
        assert!(amount_problem("fuel", MAX_AMOUNT + 1)
            .unwrap()
            .contains("must not exceed"));
        assert!(amount_problem("fuel", -1).unwrap().contains("negative"));
        assert_eq!(
            parse_cents("10000000001"),
            Err(ParseCentsError::Overflow)
        );
        assert_eq!(parse_cents("-10000000000"), Ok(-MAX_AMOUNT));
    }

    #[test]
    fn test_parse_cents_rejects_garbage() {
        assert_eq!(parse_cents(""), Err(ParseCentsError::Empty));
        assert_eq!(parse_cents("1.2.3"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("12.a"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("rupees"), Err(ParseCentsError::InvalidFormat));
    }

    #[test]
    fn test_parse_non_negative_cents() {
        assert_eq!(parse_non_negative_cents("0"), Ok(0));
        assert_eq!(parse_non_negative_cents("-1"), Err(ParseCentsError::Negative));
    }
}
