//! Account session state.
//!
//! A [`Session`] is a plain value. The client owns one and applies the
//! outcome of each network call to it; all invariants on the sequence
//! counter are enforced here so they can be tested without a peer.

use thiserror::Error;
use vortex::Address;

use crate::credential::Credential;

/// Local precondition failures. No request is made when one is returned.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StateError {
    #[error("not connected to the Convex network")]
    NotConnected,

    #[error("no address set for transaction")]
    NoAddress,
}

/// What a transaction is signed and addressed with, captured before the
/// request is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningContext {
    pub address: Address,
    pub credential: Option<Credential>,
}

/// Mutable per-client account state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    address: Option<Address>,
    credential: Option<Credential>,
    sequence: u64,
    connected: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Successful transactions since the address was last assigned.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Switch to another account. Always resets the sequence.
    pub fn set_address(&mut self, address: Address) {
        self.address = Some(address);
        self.sequence = 0;
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Reset every field to its initial value. Idempotent.
    pub fn close(&mut self) {
        *self = Self::default();
    }

    /// Check transaction preconditions and capture the signing context.
    pub fn signing_context(&self) -> Result<SigningContext, StateError> {
        if !self.connected {
            return Err(StateError::NotConnected);
        }
        let address = self.address.ok_or(StateError::NoAddress)?;
        Ok(SigningContext {
            address,
            credential: self.credential.clone(),
        })
    }

    /// Count one successful transaction sent from `address`.
    ///
    /// Ignored when the session has since moved to another account (or was
    /// closed) while the transaction was in flight.
    pub fn record_transaction(&mut self, address: Address) -> bool {
        if self.address != Some(address) {
            return false;
        }
        self.sequence += 1;
        true
    }
}
