//! Pure-logic session primitives for the VorteX Convex client.
//!
//! This crate has **no I/O**: no networking and no async runtime. It holds the
//! account context a client acts under and computes the peer URLs it talks
//! to. The host (the native `vortex-client`, or a browser via
//! `vortex-wasm`) performs the HTTP calls and feeds the outcomes back in.
//!
//! # Session lifecycle
//!
//! ```text
//! Session::new()            connected=false, no address, sequence=0
//!   └─ mark_connected()     after the handshake query succeeds
//!   └─ set_address(a)       sequence reset to 0
//!   └─ signing_context()    precondition check before every transaction
//!   └─ record_transaction() sequence += 1 after a successful transaction
//!   └─ close()              back to the initial state
//! ```

pub mod credential;
pub mod endpoints;
pub mod session;

pub use credential::Credential;
pub use endpoints::PeerEndpoints;
pub use session::{Session, SigningContext, StateError};
