use core::error;
use std::{fmt::Display, str::FromStr};

/// Identifier of a span row. Always non-negative and representable as a
/// Postgres `BIGINT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpanId(i64);

impl SpanId {
    pub fn new(value: i64) -> Result<Self, SpanIdError> {
        if value < 0 {
            return Err(SpanIdError::Negative(value));
        }
        Ok(Self(value))
    }

    /// For values already known to be valid, e.g. fixtures.
    pub const fn from_trusted(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SpanId {
    type Err = SpanIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Digits only, so signs and radix prefixes are rejected here
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SpanIdError::NotNumeric(s.to_owned()));
        }
        let value: u64 = s
            .parse()
            .map_err(|_| SpanIdError::OutOfRange(s.to_owned()))?;
        let value = i64::try_from(value).map_err(|_| SpanIdError::OutOfRange(s.to_owned()))?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanIdError {
    NotNumeric(String),
    OutOfRange(String),
    Negative(i64),
}

impl Display for SpanIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotNumeric(raw) => write!(f, "span id is not numeric: {raw:?}"),
            Self::OutOfRange(raw) => write!(f, "span id out of range: {raw}"),
            Self::Negative(value) => write!(f, "span id must not be negative: {value}"),
        }
    }
}

impl error::Error for SpanIdError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_span_id() {
        assert_eq!("42".parse::<SpanId>().unwrap().value(), 42);
        assert_eq!("0".parse::<SpanId>().unwrap().value(), 0);
        assert_eq!("007".parse::<SpanId>().unwrap().value(), 7);
    }

    #[test]
    fn test_parse_span_id_rejects_non_numeric() {
        for raw in ["abc", "", "1a", "-1", "+1", " 1", "1/2", "0x10"] {
            assert!(
                matches!(raw.parse::<SpanId>(), Err(SpanIdError::NotNumeric(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_span_id_rejects_overflow() {
        assert!(matches!(
            "9223372036854775808".parse::<SpanId>(),
            Err(SpanIdError::OutOfRange(_))
        ));
        assert!(matches!(
            "99999999999999999999999".parse::<SpanId>(),
            Err(SpanIdError::OutOfRange(_))
        ));
        assert_eq!(
            "9223372036854775807".parse::<SpanId>().unwrap().value(),
            i64::MAX
        );
    }

    #[test]
    fn test_new_rejects_negative() {
        assert_eq!(SpanId::new(-5), Err(SpanIdError::Negative(-5)));
        assert_eq!(SpanId::new(5).unwrap(), SpanId::from_trusted(5));
    }
}
