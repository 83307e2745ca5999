//! Async client for Convex peers, with `torus.exchange` helpers.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | [`ClientConfig`], read from the environment |
//! | [`error`] | [`ClientError`] and its [`ErrorKind`] |
//! | [`peer`] | [`PeerClient`] and the peer protocol |
//! | [`dex`] | Exchange and token operations on [`PeerClient`] |
//! | [`swap`] | [`SwapController`], a headless swap form over a [`SwapBackend`] |
//!
//! # Quick start
//!
//! ```no_run
//! use vortex::Address;
//! use vortex_client::{ClientConfig, PeerClient};
//!
//! # async fn run() -> Result<(), vortex_client::ClientError> {
//! let client = PeerClient::connect(ClientConfig::default(), None).await?;
//! client.buy_tokens(Address::new(99), 2.5).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dex;
pub mod error;
pub mod peer;
pub mod swap;

pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ErrorKind};
pub use peer::{AccountOrigin, PeerClient, DEMO_ACCOUNT_KEY};
pub use vortex_session::Credential;
pub use swap::{
    BalanceView, Side, SwapBackend, SwapController, SwapError, TokenRegistry, TokenSpec,
    BALANCE_POLL_INTERVAL, ESTIMATE_RATE,
};
