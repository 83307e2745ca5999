//! Client configuration, populated from environment variables.

use std::time::Duration;

use vortex::Address;
use vortex_session::Credential;

/// Public Convex test network peer.
pub const DEFAULT_PEER_URL: &str = "http://peer.convex.live:8080";

/// Per-request deadline applied to every call to the peer.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Copper requested from the faucet for a freshly created account.
pub const DEFAULT_FAUCET_AMOUNT: u64 = 10_000_000;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for a [`crate::PeerClient`].
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `VORTEX_PEER_URL` | `http://peer.convex.live:8080` | Peer base URL |
/// | `VORTEX_TIMEOUT_MS` | `30000` | Request deadline in milliseconds |
/// | `VORTEX_FAUCET_AMOUNT` | `10000000` | Copper requested for new accounts |
/// | `VORTEX_ADDRESS` | (absent) | Existing account to act as |
/// | `VORTEX_SEED` | (absent) | Credential for `VORTEX_ADDRESS` |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the peer, e.g. `"http://localhost:8080"`.
    pub peer_url: String,

    /// Deadline for each individual request.
    pub timeout: Duration,

    /// Amount requested from the faucet after account creation.
    pub faucet_amount: u64,

    /// Account to adopt instead of provisioning one. Only used together
    /// with `credential`.
    pub address: Option<Address>,

    pub credential: Option<Credential>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer_url: DEFAULT_PEER_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            faucet_amount: DEFAULT_FAUCET_AMOUNT,
            address: None,
            credential: None,
        }
    }
}

impl ClientConfig {
    /// Defaults, pointed at `peer_url`.
    pub fn new(peer_url: impl Into<String>) -> Self {
        Self {
            peer_url: peer_url.into(),
            ..Self::default()
        }
    }

    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("VORTEX_PEER_URL") {
            config.peer_url = url;
        }
        if let Some(ms) = lookup("VORTEX_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_u64("VORTEX_TIMEOUT_MS", &ms)?);
        }
        if let Some(amount) = lookup("VORTEX_FAUCET_AMOUNT") {
            config.faucet_amount = parse_u64("VORTEX_FAUCET_AMOUNT", &amount)?;
        }
        if let Some(raw) = lookup("VORTEX_ADDRESS") {
            config.address = Some(Address::parse(&raw).map_err(|e| ConfigError::Invalid {
                var: "VORTEX_ADDRESS",
                value: raw.clone(),
                reason: e.to_string(),
            })?);
        }
        config.credential = lookup("VORTEX_SEED").map(Credential::new);

        Ok(config)
    }

    /// The configured account, when both halves are present.
    pub fn account(&self) -> Option<(Address, Credential)> {
        match (&self.address, &self.credential) {
            (Some(address), Some(credential)) => Some((*address, credential.clone())),
            _ => None,
        }
    }
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
