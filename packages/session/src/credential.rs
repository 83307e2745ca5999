//! Opaque signing material forwarded to the peer.

/// The secret a transaction is authorised with.
///
/// The client never parses or derives anything from it; it is passed to the
/// peer verbatim as the `seed` field of a transaction request. `Debug`
/// output is redacted so that sessions can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Symbolic credential used with the fallback demo account.
    pub const DEMO: &'static str = "demo";

    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn demo() -> Self {
        Self(Self::DEMO.to_string())
    }

    pub fn is_demo(&self) -> bool {
        self.0 == Self::DEMO
    }

    /// The raw secret, for placing into a request body.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_demo() {
            f.write_str("Credential(demo)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}
