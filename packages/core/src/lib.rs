//! Core types for the VorteX Convex client.
//!
//! This crate has no I/O. It defines the values that flow between the
//! client and a Convex peer and the rules for turning them into source text
//! the peer evaluates. It is shared by the native client, the CLI, and the
//! WebAssembly bindings.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`address`] | [`Address`], validated `#N` account identifiers |
//! | [`units`] | [`Decimals`] and truncating amount ↔ unit conversion |
//! | [`call`] | [`RemoteCall`], typed DEX/token operations and their encoder |
//!
//! # Quick start
//!
//! ```rust
//! use vortex::{Address, RemoteCall};
//!
//! let call = RemoteCall::BuyTokens { token: Address::new(99), cvx: 2.5 };
//! let source = call.to_source().unwrap();
//! assert!(source.contains("2500000000"));
//! ```

pub mod address;
pub mod call;
pub mod units;

pub use address::{Address, AddressError};
pub use call::{CallError, RemoteCall, EXCHANGE_PROBE_RESULT, HANDSHAKE_RESULT};
pub use units::{native_units, token_units, Decimals, UnitsError};
