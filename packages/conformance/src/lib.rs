//! Shared helpers for the VorteX conformance test suite.
//!
//! Provides [`spawn_mock_peer`], which binds a `TcpListener` on an ephemeral
//! port and serves the five peer endpoints the client uses from a scripted
//! [`PeerBehaviour`]. Every request is recorded so tests can assert on what
//! the client actually sent, including that nothing was sent at all.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use vortex::{Address, EXCHANGE_PROBE_RESULT, HANDSHAKE_RESULT};
use vortex_peer_api::{
    codes, CreateAccountRequest, FaucetRequest, QueryRequest, RemoteResult, TransactRequest,
};

// ---------------------------------------------------------------------------
// Behaviour
// ---------------------------------------------------------------------------

/// How the mock peer answers a class of requests.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with the given result body.
    Result(RemoteResult),
    /// Non-2xx status with an empty JSON body.
    Status(u16),
}

/// What `createAccount` does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccountIssue {
    Issue(u64),
    Reject(u16),
}

/// Scripted peer behaviour. [`Default`] is a healthy peer with the exchange
/// deployed.
#[derive(Debug, Clone)]
pub struct PeerBehaviour {
    /// Value returned for the connection test.
    pub handshake: Value,
    pub exchange_available: bool,
    pub create_account: AccountIssue,
    pub faucet_status: u16,
    /// Native balances by account number; absent accounts read as `null`.
    pub balances: HashMap<u64, u64>,
    /// Value returned for any token balance query.
    pub token_balance: Value,
    /// Raw token units returned by `torus/price`.
    pub price: Value,
    pub market: Value,
    /// Overrides every query other than the handshake and exchange probe.
    pub query_override: Option<Reply>,
    /// Reply to every transaction. Defaults to success.
    pub transact_reply: Reply,
    /// Time taken to answer each transaction.
    pub transact_delay: Duration,
}

impl Default for PeerBehaviour {
    fn default() -> Self {
        Self {
            handshake: json!(HANDSHAKE_RESULT),
            exchange_available: true,
            create_account: AccountIssue::Issue(1337),
            faucet_status: 200,
            balances: HashMap::new(),
            token_balance: Value::Null,
            price: json!(0),
            market: Value::Null,
            query_override: None,
            transact_reply: Reply::Result(RemoteResult::ok(true).with_juice(1000)),
            transact_delay: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Recorded requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Query,
    Transact,
    CreateAccount,
    Faucet,
    /// `GET /api/v1/accounts/{n}` with the path segment as received.
    Account(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub endpoint: Endpoint,
    pub body: Value,
}

struct Shared {
    behaviour: Mutex<PeerBehaviour>,
    log: Mutex<Vec<Recorded>>,
}

impl Shared {
    fn behaviour(&self) -> MutexGuard<'_, PeerBehaviour> {
        self.behaviour.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, endpoint: Endpoint, body: Value) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Recorded { endpoint, body });
    }
}

/// Handle to a running mock peer.
#[derive(Clone)]
pub struct MockPeer {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl MockPeer {
    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.shared
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    /// Bodies of requests to `endpoint`.
    pub fn bodies(&self, endpoint: &Endpoint) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| &r.endpoint == endpoint)
            .map(|r| r.body)
            .collect()
    }

    /// Transaction bodies, decoded.
    pub fn transactions(&self) -> Vec<TransactRequest> {
        self.bodies(&Endpoint::Transact)
            .into_iter()
            .filter_map(|b| serde_json::from_value(b).ok())
            .collect()
    }

    /// Change the peer's behaviour for subsequent requests.
    pub fn update(&self, f: impl FnOnce(&mut PeerBehaviour)) {
        f(&mut self.shared.behaviour());
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn reply(r: Reply) -> Response {
    match r {
        Reply::Result(result) => Json(result).into_response(),
        Reply::Status(code) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({})),
        )
            .into_response(),
    }
}

async fn query(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.record(Endpoint::Query, body.clone());
    let Ok(req) = serde_json::from_value::<QueryRequest>(body) else {
        return reply(Reply::Status(400));
    };
    let b = shared.behaviour().clone();
    let source = req.source.as_str();

    if source == "(+ 2 2 2 1)" {
        return reply(Reply::Result(RemoteResult::ok(b.handshake)));
    }
    if source.contains(EXCHANGE_PROBE_RESULT) {
        return reply(Reply::Result(if b.exchange_available {
            RemoteResult::ok(EXCHANGE_PROBE_RESULT)
        } else {
            RemoteResult::error(codes::UNDECLARED, "Undeclared symbol: torus")
        }));
    }
    if let Some(over) = b.query_override {
        return reply(over);
    }

    let value = if let Some(n) = native_balance_target(source) {
        b.balances.get(&n).map_or(Value::Null, |v| json!(v))
    } else if source.contains("fungible/balance") || source.starts_with("(call ") {
        b.token_balance
    } else if source.contains("torus/price") {
        b.price
    } else if source.contains("torus/get-market") {
        b.market
    } else {
        Value::Null
    };
    reply(Reply::Result(RemoteResult::ok(value)))
}

/// `(balance #N)` → `N`.
fn native_balance_target(source: &str) -> Option<u64> {
    let inner = source.strip_prefix("(balance ")?.strip_suffix(')')?;
    Address::parse(inner).ok().map(Address::number)
}

async fn transact(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.record(Endpoint::Transact, body.clone());
    if serde_json::from_value::<TransactRequest>(body).is_err() {
        return reply(Reply::Status(400));
    }
    let (r, delay) = {
        let b = shared.behaviour();
        (b.transact_reply.clone(), b.transact_delay)
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    reply(r)
}

async fn create_account(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.record(Endpoint::CreateAccount, body.clone());
    if serde_json::from_value::<CreateAccountRequest>(body).is_err() {
        return reply(Reply::Status(400));
    }
    let issue = shared.behaviour().create_account;
    match issue {
        AccountIssue::Issue(n) => Json(json!({ "address": n })).into_response(),
        AccountIssue::Reject(code) => reply(Reply::Status(code)),
    }
}

async fn faucet(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.record(Endpoint::Faucet, body.clone());
    let Ok(req) = serde_json::from_value::<FaucetRequest>(body) else {
        return reply(Reply::Status(400));
    };
    let status = shared.behaviour().faucet_status;
    if status != 200 {
        return reply(Reply::Status(status));
    }
    Json(json!({ "address": req.address.number(), "amount": req.amount })).into_response()
}

async fn account(State(shared): State<Arc<Shared>>, Path(id): Path<String>) -> Response {
    shared.record(Endpoint::Account(id.clone()), Value::Null);
    let Ok(address) = id.parse::<u64>() else {
        return reply(Reply::Status(404));
    };
    let balance = shared.behaviour().balances.get(&address).copied();
    match balance {
        Some(balance) => Json(json!({
            "address": address,
            "balance": balance,
            "sequence": 0,
            "type": "user",
        }))
        .into_response(),
        None => reply(Reply::Status(404)),
    }
}

// ---------------------------------------------------------------------------
// spawn_mock_peer
// ---------------------------------------------------------------------------

/// Start an in-process mock peer and return a handle to it.
///
/// The peer runs in a background `tokio` task bound to an OS-assigned port
/// on `127.0.0.1`; [`MockPeer::base_url`] is e.g. `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound.
pub async fn spawn_mock_peer(behaviour: PeerBehaviour) -> MockPeer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");

    let shared = Arc::new(Shared {
        behaviour: Mutex::new(behaviour),
        log: Mutex::new(Vec::new()),
    });

    let router = Router::new()
        .route("/api/v1/query", post(query))
        .route("/api/v1/transact", post(transact))
        .route("/api/v1/createAccount", post(create_account))
        .route("/api/v1/faucet", post(faucet))
        .route("/api/v1/accounts/{id}", get(account))
        .with_state(Arc::clone(&shared));

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("mock peer error");
    });

    MockPeer {
        base_url: format!("http://{addr}"),
        shared,
    }
}

/// A client config pointed at `peer` with a short deadline.
pub fn config_for(peer: &MockPeer) -> vortex_client::ClientConfig {
    vortex_client::ClientConfig {
        timeout: std::time::Duration::from_secs(5),
        ..vortex_client::ClientConfig::new(peer.base_url.clone())
    }
}
