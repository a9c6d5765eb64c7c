//! Numeric field parsing for log records
//!
//! Mode and flag fields are octal, offsets and lengths are decimal, and
//! extended-attribute flags take a C-style base prefix (`0x` hex, leading
//! `0` octal, otherwise decimal). Out-of-range values are rejected rather
//! than saturated.

use std::num::IntErrorKind;

use super::ParseError;

/// Radix selector for a numeric field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    /// Base 8
    Octal,
    /// Base 10
    Decimal,
    /// Base taken from the literal's prefix
    Prefixed,
}

impl Radix {
    fn value(self) -> u32 {
        match self {
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Prefixed => 0,
        }
    }
}

/// Split a C-style literal into its sign, digits and base
fn split_prefixed(text: &str) -> (bool, &str, u32) {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (negative, hex, 16)
    } else if body.len() > 1 && body.starts_with('0') {
        (negative, &body[1..], 8)
    } else {
        (negative, body, 10)
    }
}

/// Parse a field into an `i64`, reporting failures against `op`/`field`
pub fn parse_i64(op: &str, field: &'static str, text: &str, radix: Radix) -> Result<i64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        op: op.to_string(),
        field,
        value: text.to_string(),
        radix: radix.value(),
    };
    let overflow = || ParseError::Overflow {
        op: op.to_string(),
        field,
        value: text.to_string(),
    };

    let classify = |e: std::num::ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => overflow(),
        _ => invalid(),
    };

    match radix {
        Radix::Prefixed => {
            let (negative, digits, base) = split_prefixed(text);
            if digits.starts_with(['+', '-']) {
                return Err(invalid());
            }
            // parse the magnitude unsigned so i64::MIN stays representable
            let magnitude = u64::from_str_radix(digits, base).map_err(classify)?;
            if negative {
                if magnitude > i64::MAX as u64 + 1 {
                    return Err(overflow());
                }
                Ok((magnitude as i64).wrapping_neg())
            } else {
                i64::try_from(magnitude).map_err(|_| overflow())
            }
        }
        _ => i64::from_str_radix(text, radix.value()).map_err(classify),
    }
}

/// Parse a field and narrow it to `T`, rejecting values that do not fit
pub fn parse_as<T>(op: &str, field: &'static str, text: &str, radix: Radix) -> Result<T, ParseError>
where
    T: TryFrom<i64>,
{
    let wide = parse_i64(op, field, text, radix)?;
    T::try_from(wide).map_err(|_| ParseError::Overflow {
        op: op.to_string(),
        field,
        value: text.to_string(),
    })
}
