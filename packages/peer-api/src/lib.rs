//! Request and response types for the Convex peer REST API.
//!
//! This crate encodes the subset of the peer's HTTP/JSON contract that the
//! VorteX client relies on. Both the client and the in-process mock peer used
//! by the conformance suite build on these types, so the two cannot drift.
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | POST | `/api/v1/query` | [`QueryRequest`] → [`RemoteResult`] |
//! | POST | `/api/v1/transact` | [`TransactRequest`] → [`RemoteResult`] |
//! | POST | `/api/v1/createAccount` | [`CreateAccountRequest`] → [`CreateAccountResponse`] |
//! | POST | `/api/v1/faucet` | [`FaucetRequest`] → JSON |
//! | GET | `/api/v1/accounts/{n}` | → [`AccountInfo`] |

pub mod account;
pub mod eval;

pub use account::{AccountInfo, CreateAccountRequest, CreateAccountResponse, FaucetRequest};
pub use eval::{codes, QueryRequest, RemoteResult, TransactRequest, TxInfo};
