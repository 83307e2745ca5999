//! Convex account addresses in `#<number>` format.
//!
//! An [`Address`] identifies an account (user or actor) on the peer. The
//! canonical textual form carries a single leading `#` marker; the REST
//! resource paths on the peer use the bare number instead.
//!
//! Addresses are validated on construction so that they can be spliced into
//! remote expressions without any further escaping.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur when parsing an address string.
#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("address must not be empty")]
    Empty,

    #[error("address must be '#' followed by digits, got: {0:?}")]
    Malformed(String),

    #[error("address {0:?} is out of range")]
    OutOfRange(String),
}

/// A parsed account address, e.g. `#12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(u64);

impl Address {
    /// The well-known account used for the connection handshake and as the
    /// demo fallback when account creation is unavailable.
    pub const FALLBACK: Address = Address(12);

    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn number(self) -> u64 {
        self.0
    }

    /// Parse `#12` or `12`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        let caps = ADDRESS_RE
            .captures(s)
            .ok_or_else(|| AddressError::Malformed(s.to_string()))?;
        caps[1]
            .parse::<u64>()
            .map(Self)
            .map_err(|_| AddressError::OutOfRange(s.to_string()))
    }

    /// The address with its `#` marker removed, as used in REST paths.
    pub fn without_marker(self) -> String {
        self.0.to_string()
    }
}

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?([0-9]+)$").expect("invalid address regex"));

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Serialises in the canonical `#N` form.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts either `"#N"`/`"N"` strings or bare JSON integers; peers are not
/// consistent about which one they return.
impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_marker() {
        assert_eq!(Address::parse("#12"), Ok(Address::new(12)));
    }

    #[test]
    fn parse_without_marker() {
        assert_eq!(Address::parse("99"), Ok(Address::new(99)));
    }

    #[test]
    fn parse_rejects_expression_text() {
        assert!(matches!(
            Address::parse("#12) (transfer #13 1000"),
            Err(AddressError::Malformed(_))
        ));
        assert!(matches!(Address::parse("+5"), Err(AddressError::Malformed(_))));
        assert!(matches!(Address::parse("##5"), Err(AddressError::Malformed(_))));
    }

    #[test]
    fn parse_empty() {
        assert_eq!(Address::parse("  "), Err(AddressError::Empty));
    }

    #[test]
    fn parse_out_of_range() {
        assert!(matches!(
            Address::parse("#99999999999999999999999"),
            Err(AddressError::OutOfRange(_))
        ));
    }

    #[test]
    fn strips_exactly_one_marker() {
        assert_eq!(Address::parse("#12").unwrap().without_marker(), "12");
    }

    #[test]
    fn display_has_marker() {
        assert_eq!(Address::FALLBACK.to_string(), "#12");
    }

    #[test]
    fn deserialize_from_number_or_string() {
        let a: Address = serde_json::from_str("42").unwrap();
        let b: Address = serde_json::from_str(r##""#42""##).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), r##""#42""##);
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert!(serde_json::from_str::<Address>(r#""alice""#).is_err());
    }
}
