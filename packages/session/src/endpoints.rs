//! Peer endpoint URLs.
//!
//! [`PeerEndpoints`] turns a peer base URL into the full URL of each REST
//! endpoint the client calls. There is no I/O here; the host makes the
//! requests.

use vortex::Address;

/// URL helpers for one Convex peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEndpoints {
    base: String,
}

impl PeerEndpoints {
    /// Build from the peer's base URL, e.g. `http://peer.convex.live:8080`.
    /// A trailing slash is ignored.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// `{base}/api/v1/query`, read-only evaluation via `POST`.
    pub fn query_url(&self) -> String {
        format!("{}/api/v1/query", self.base)
    }

    /// `{base}/api/v1/transact`, signed, state-changing evaluation via `POST`.
    pub fn transact_url(&self) -> String {
        format!("{}/api/v1/transact", self.base)
    }

    // ── Accounts ──────────────────────────────────────────────────────────────

    /// `{base}/api/v1/createAccount`
    pub fn create_account_url(&self) -> String {
        format!("{}/api/v1/createAccount", self.base)
    }

    /// `{base}/api/v1/faucet`
    pub fn faucet_url(&self) -> String {
        format!("{}/api/v1/faucet", self.base)
    }

    /// `{base}/api/v1/accounts/{number}`, using the address without its `#`.
    pub fn account_url(&self, address: Address) -> String {
        format!("{}/api/v1/accounts/{}", self.base, address.without_marker())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
