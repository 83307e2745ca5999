//! HTTP client for a single Convex peer.
//!
//! [`PeerClient`] wraps the peer's REST API (`query`, `transact`,
//! `createAccount`, `faucet`, `accounts/{n}`) and owns the account
//! [`Session`] that transactions are signed and counted against.
//!
//! # Design
//!
//! All methods take `&self`, so one client can be shared behind an [`Arc`]
//! by a UI task and a background poller. The session sits behind a lock that
//! is never held across an `.await`: transactions capture a
//! [`SigningContext`] before sending and apply their outcome afterwards.
//!
//! Every request carries the configured deadline. Only responses that are
//! 2xx, decode, and carry no `errorCode` count as success.
//!
//! [`Arc`]: std::sync::Arc
//! [`SigningContext`]: vortex_session::SigningContext

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use vortex::{Address, RemoteCall, EXCHANGE_PROBE_RESULT, HANDSHAKE_RESULT};
use vortex_peer_api::{
    AccountInfo, CreateAccountRequest, CreateAccountResponse, FaucetRequest, QueryRequest,
    RemoteResult, TransactRequest,
};
use vortex_session::{Credential, PeerEndpoints, Session};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Public key registered for freshly created demo accounts. It doubles as
/// the credential those accounts are transacted with.
pub const DEMO_ACCOUNT_KEY: &str =
    "d82e78594610f708ad47f666bbacbab1711760652cb88bf7515ed6c3ae84a08d";

/// How [`PeerClient::create_demo_account`] obtained its account.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountOrigin {
    /// The peer issued a new account.
    Created(CreateAccountResponse),
    /// Account creation was unavailable; the shared demo account is in use.
    Demo,
}

impl AccountOrigin {
    pub fn is_demo(&self) -> bool {
        matches!(self, AccountOrigin::Demo)
    }
}

// ---------------------------------------------------------------------------
// PeerClient
// ---------------------------------------------------------------------------

pub struct PeerClient {
    http: Client,
    endpoints: PeerEndpoints,
    config: ClientConfig,
    session: RwLock<Session>,
    exchange_available: AtomicBool,
}

impl PeerClient {
    /// Create a client for `config.peer_url`. No request is made.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http(Client::new(), config)
    }

    /// Create a client that reuses a pre-configured `reqwest::Client`.
    pub fn with_http(http: Client, config: ClientConfig) -> Self {
        Self {
            http,
            endpoints: PeerEndpoints::new(config.peer_url.clone()),
            config,
            session: RwLock::new(Session::new()),
            exchange_available: AtomicBool::new(false),
        }
    }

    /// Create a client, run [`initialize`], then adopt `account` or, when
    /// none is given, provision one with [`create_demo_account`].
    ///
    /// [`initialize`]: PeerClient::initialize
    /// [`create_demo_account`]: PeerClient::create_demo_account
    pub async fn connect(
        config: ClientConfig,
        account: Option<(Address, Credential)>,
    ) -> Result<Self, ClientError> {
        let client = Self::new(config);
        client.initialize().await?;
        match account {
            Some((address, credential)) => {
                client.set_address(address);
                client.set_credential(credential);
            }
            None => {
                client.create_demo_account().await;
            }
        }
        Ok(client)
    }

    // ── Session accessors ──────────────────────────────────────────────────

    pub fn endpoints(&self) -> &PeerEndpoints {
        &self.endpoints
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn address(&self) -> Option<Address> {
        self.session().address()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.session().credential().cloned()
    }

    pub fn sequence(&self) -> u64 {
        self.session().sequence()
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_connected()
    }

    /// Result of the last exchange probe. `false` until one succeeds.
    pub fn exchange_available(&self) -> bool {
        self.exchange_available.load(Ordering::Relaxed)
    }

    /// Act as `address` from now on. Resets the sequence counter.
    pub fn set_address(&self, address: Address) {
        self.session_mut().set_address(address);
    }

    pub fn set_credential(&self, credential: Credential) {
        self.session_mut().set_credential(credential);
    }

    /// Forget the account and connection state. Safe to call repeatedly.
    pub fn close(&self) {
        self.session_mut().close();
        self.exchange_available.store(false, Ordering::Relaxed);
        info!("peer: connection closed");
    }

    fn session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Lifecycle ──────────────────────────────────────────────────────────

    /// Verify the peer evaluates code correctly, then mark the session
    /// connected and probe for the exchange library.
    ///
    /// The handshake runs as [`Address::FALLBACK`] regardless of the session
    /// address. A failed exchange probe is logged and does not fail
    /// initialization.
    pub async fn initialize(&self) -> Result<(), ClientError> {
        info!("peer: connecting to {}", self.endpoints.base());

        let source = RemoteCall::Handshake.to_source()?;
        let result = self
            .query(&source, Address::FALLBACK)
            .await
            .inspect_err(|e| error!("peer: connection test failed: {e}"))?;

        // Peers may encode the number as a float.
        if result.value.as_f64() != Some(HANDSHAKE_RESULT as f64) {
            let err = ClientError::HandshakeMismatch {
                expected: HANDSHAKE_RESULT,
                got: result.value,
            };
            error!("peer: {err}");
            return Err(err);
        }

        self.session_mut().mark_connected();
        info!("peer: connected to {}", self.endpoints.base());

        if !self.probe_exchange().await {
            warn!("peer: torus.exchange not available, DEX calls may fail");
        }
        Ok(())
    }

    /// Check whether `torus.exchange` can be imported on the peer.
    pub async fn probe_exchange(&self) -> bool {
        let available = match RemoteCall::ProbeExchange.to_source() {
            Ok(source) => match self.query(&source, Address::FALLBACK).await {
                Ok(result) => result.value.as_str() == Some(EXCHANGE_PROBE_RESULT),
                Err(e) => {
                    debug!("peer: exchange probe failed: {e}");
                    false
                }
            },
            Err(_) => false,
        };
        self.exchange_available.store(available, Ordering::Relaxed);
        if available {
            info!("peer: torus.exchange available");
        }
        available
    }

    // ── Provisioning ───────────────────────────────────────────────────────

    /// Obtain an account to act as.
    ///
    /// Asks the peer for a new account registered to [`DEMO_ACCOUNT_KEY`]
    /// and funds it from the faucet. When the peer refuses or cannot be
    /// reached, falls back to [`Address::FALLBACK`] with the demo
    /// credential. Never fails; either way the session ends up with an
    /// address.
    pub async fn create_demo_account(&self) -> AccountOrigin {
        match self.issue_account().await {
            Ok(created) => {
                self.set_address(created.address);
                self.set_credential(Credential::new(DEMO_ACCOUNT_KEY));
                info!("peer: created account {}", created.address);
                self.request_faucet_coins(created.address).await;
                AccountOrigin::Created(created)
            }
            Err(e) => {
                info!("peer: account creation unavailable ({e}), using demo account");
                self.set_address(Address::FALLBACK);
                self.set_credential(Credential::demo());
                AccountOrigin::Demo
            }
        }
    }

    async fn issue_account(&self) -> Result<CreateAccountResponse, ClientError> {
        let body = CreateAccountRequest {
            account_key: DEMO_ACCOUNT_KEY.to_string(),
        };
        self.post_json("account creation", self.endpoints.create_account_url(), &body)
            .await
    }

    /// Ask the faucet to fund `address` with the configured amount.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn request_faucet_coins(&self, address: Address) -> Option<Value> {
        let body = FaucetRequest {
            address,
            amount: self.config.faucet_amount.to_string(),
        };
        match self
            .post_json::<_, Value>("faucet", self.endpoints.faucet_url(), &body)
            .await
        {
            Ok(reply) => {
                info!("peer: faucet funded {address}");
                Some(reply)
            }
            Err(e) => {
                warn!("peer: faucet request failed: {e}");
                None
            }
        }
    }

    // ── Query / transact ───────────────────────────────────────────────────

    /// Evaluate `source` read-only as `address`.
    pub async fn query(&self, source: &str, address: Address) -> Result<RemoteResult, ClientError> {
        let body = QueryRequest {
            address,
            source: source.to_string(),
        };
        let result: RemoteResult = self
            .post_json("query", self.endpoints.query_url(), &body)
            .await
            .inspect_err(|e| error!("peer: query failed: {e}"))?;
        check_remote("query", result)
    }

    /// Submit `source` as a transaction from the session account.
    ///
    /// Requires a connected session with an address; otherwise fails with a
    /// state error before any request is made. The sequence counter advances
    /// by one only when the transaction succeeds and the session still acts
    /// as the same account.
    pub async fn transact(&self, source: &str) -> Result<RemoteResult, ClientError> {
        let signing = self.session().signing_context()?;

        info!("peer: executing transaction as {}: {source}", signing.address);
        let body = TransactRequest {
            address: signing.address,
            source: source.to_string(),
            seed: signing.credential.map(|c| c.expose().to_string()),
        };
        let result = self
            .post_json("transaction", self.endpoints.transact_url(), &body)
            .await
            .and_then(|result| check_remote("transaction", result))
            .inspect_err(|e| error!("peer: transaction failed: {e}"))?;

        if !self.session_mut().record_transaction(signing.address) {
            debug!("peer: address changed during transaction, sequence not advanced");
        }
        info!(juice = ?result.juice(), "peer: transaction completed");
        Ok(result)
    }

    /// Query a read-only [`RemoteCall`] as `address`.
    pub async fn query_call(
        &self,
        call: &RemoteCall,
        address: Address,
    ) -> Result<RemoteResult, ClientError> {
        let source = call.to_source()?;
        self.query(&source, address).await
    }

    /// Submit a [`RemoteCall`] as a transaction.
    pub async fn transact_call(&self, call: &RemoteCall) -> Result<RemoteResult, ClientError> {
        let source = call.to_source()?;
        self.transact(&source).await
    }

    // ── Balances ───────────────────────────────────────────────────────────

    /// Native balance of `address` in copper. Any failure reads as `0`.
    pub async fn get_balance(&self, address: Address) -> u64 {
        match self.query_call(&RemoteCall::Balance { address }, address).await {
            Ok(result) => balance_from_value(&result.value).unwrap_or_else(|| {
                warn!("peer: non-numeric balance for {address}: {}", result.value);
                0
            }),
            Err(e) => {
                warn!("peer: balance lookup failed for {address}: {e}");
                0
            }
        }
    }

    /// Account record for `address`, or `None` when unavailable.
    pub async fn get_account_info(&self, address: Address) -> Option<AccountInfo> {
        let response = match self
            .http
            .get(self.endpoints.account_url(address))
            .timeout(self.config.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("peer: account lookup failed for {address}: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "peer: account lookup for {address} returned {}",
                response.status()
            );
            return None;
        }

        match response.json().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("peer: unreadable account record for {address}: {e}");
                None
            }
        }
    }

    /// `convex.fungible` balance of `holder` in `token`, in raw units.
    ///
    /// Unlike [`get_balance`], failures are returned to the caller.
    ///
    /// [`get_balance`]: PeerClient::get_balance
    pub async fn get_token_balance(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<u64, ClientError> {
        let result = self
            .query_call(&RemoteCall::TokenBalance { token, holder }, holder)
            .await?;
        balance_from_value(&result.value).ok_or(ClientError::UnexpectedValue(result.value))
    }

    // ── Transport ──────────────────────────────────────────────────────────

    async fn post_json<B, T>(
        &self,
        operation: &'static str,
        url: String,
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(&url)
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Network { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                operation,
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|source| ClientError::Network { operation, source })
    }
}

fn check_remote(operation: &'static str, result: RemoteResult) -> Result<RemoteResult, ClientError> {
    match result.error_code() {
        Some(code) => Err(ClientError::Remote {
            operation,
            code: code.to_string(),
            message: result.error_message().unwrap_or_else(|| code.to_string()),
        }),
        None => Ok(result),
    }
}

/// Interpret a peer value as an integer balance. `null` means an empty
/// holding.
pub(crate) fn balance_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Null => Some(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
