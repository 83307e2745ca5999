//! Headless swap controller.
//!
//! [`SwapController`] holds the state behind a two-sided swap form: the
//! selected tokens, the entered amount and its estimate, and balances. It
//! routes a swap to the exchange call matching the direction:
//!
//! | From | To | Call |
//! |------|----|------|
//! | native | token | `buy-tokens` |
//! | token | native | `sell-tokens` |
//! | anything else | | rejected; route through CVX |
//!
//! The controller talks to the network only through [`SwapBackend`], which
//! [`PeerClient`] implements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vortex::{Address, Decimals, RemoteCall};
use vortex_peer_api::RemoteResult;

use crate::error::ClientError;
use crate::peer::{balance_from_value, PeerClient};

/// Fraction of the input shown as the expected output.
pub const ESTIMATE_RATE: f64 = 0.97;

/// Default period of [`SwapController::poll_balances`].
pub const BALANCE_POLL_INTERVAL: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// SwapBackend
// ---------------------------------------------------------------------------

/// Network operations the controller depends on.
#[async_trait]
pub trait SwapBackend: Send + Sync {
    fn is_connected(&self) -> bool;

    fn address(&self) -> Option<Address>;

    /// Native balance in copper; failures read as `0`.
    async fn native_balance(&self, holder: Address) -> u64;

    async fn query(&self, source: &str, address: Address) -> Result<RemoteResult, ClientError>;

    async fn buy_tokens(&self, token: Address, cvx_amount: f64)
        -> Result<RemoteResult, ClientError>;

    async fn sell_tokens(
        &self,
        token: Address,
        token_amount: f64,
    ) -> Result<RemoteResult, ClientError>;

    fn close(&self);
}

#[async_trait]
impl SwapBackend for PeerClient {
    fn is_connected(&self) -> bool {
        PeerClient::is_connected(self)
    }

    fn address(&self) -> Option<Address> {
        PeerClient::address(self)
    }

    async fn native_balance(&self, holder: Address) -> u64 {
        self.get_balance(holder).await
    }

    async fn query(&self, source: &str, address: Address) -> Result<RemoteResult, ClientError> {
        PeerClient::query(self, source, address).await
    }

    async fn buy_tokens(
        &self,
        token: Address,
        cvx_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        PeerClient::buy_tokens(self, token, cvx_amount).await
    }

    async fn sell_tokens(
        &self,
        token: Address,
        token_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        PeerClient::sell_tokens(self, token, token_amount).await
    }

    fn close(&self) {
        PeerClient::close(self)
    }
}

// ---------------------------------------------------------------------------
// Token registry
// ---------------------------------------------------------------------------

/// A token the controller can trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpec {
    pub symbol: String,
    /// Actor address of the token; `None` for native coin and for tokens
    /// not yet deployed on the connected network.
    pub address: Option<Address>,
    pub decimals: Decimals,
    /// Whether this entry denotes the native coin.
    pub native: bool,
}

impl TokenSpec {
    pub fn native(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            address: None,
            decimals: Decimals::NATIVE,
            native: true,
        }
    }

    pub fn token(symbol: &str, address: Option<Address>) -> Self {
        Self {
            symbol: symbol.to_string(),
            address,
            decimals: Decimals::TOKEN,
            native: false,
        }
    }
}

/// Symbols the controller knows about.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<TokenSpec>,
}

impl Default for TokenRegistry {
    /// CVX and CVM (both native), plus PAI, USDC, and TOKEN without
    /// addresses.
    fn default() -> Self {
        Self {
            tokens: vec![
                TokenSpec::native("CVX"),
                TokenSpec::native("CVM"),
                TokenSpec::token("PAI", None),
                TokenSpec::token("USDC", None),
                TokenSpec::token("TOKEN", None),
            ],
        }
    }
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenSpec>) -> Self {
        Self { tokens }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, symbol: &str) -> Option<&TokenSpec> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Record the deployed address of `symbol`, adding it when unknown.
    pub fn with_address(mut self, symbol: &str, address: Address) -> Self {
        match self
            .tokens
            .iter_mut()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
        {
            Some(spec) => spec.address = Some(address),
            None => self.tokens.push(TokenSpec::token(symbol, Some(address))),
        }
        self
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.symbol.as_str())
    }
}

// ---------------------------------------------------------------------------
// SwapController
// ---------------------------------------------------------------------------

/// Errors from [`SwapController`].
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("not connected to the Convex network")]
    NotConnected,

    #[error("a swap is already in progress")]
    InProgress,

    #[error("invalid swap amount: {0}")]
    InvalidAmount(f64),

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("token {0} has no address on this network")]
    UnlistedToken(String),

    #[error("token-to-token swaps are not supported ({from} -> {to}); swap through CVX")]
    Unsupported { from: String, to: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Which half of the swap form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

/// Balances of the selected pair, in raw units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub from_symbol: String,
    pub from: u64,
    pub to_symbol: String,
    pub to: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct FormState {
    from: String,
    to: String,
    from_amount: Option<f64>,
    to_amount: Option<f64>,
}

pub struct SwapController<B> {
    backend: Arc<B>,
    registry: TokenRegistry,
    form: Mutex<FormState>,
    swapping: AtomicBool,
}

/// Clears the in-progress flag when a swap attempt ends.
struct SwapGuard<'a>(&'a AtomicBool);

impl Drop for SwapGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: SwapBackend> SwapController<B> {
    /// A controller trading CVX for PAI by default.
    pub fn new(backend: Arc<B>, registry: TokenRegistry) -> Self {
        Self {
            backend,
            registry,
            form: Mutex::new(FormState {
                from: "CVX".to_string(),
                to: "PAI".to_string(),
                from_amount: None,
                to_amount: None,
            }),
            swapping: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Currently selected `(from, to)` symbols.
    pub fn pair(&self) -> (String, String) {
        let form = self.form();
        (form.from.clone(), form.to.clone())
    }

    /// Entered amount and its estimate, if any.
    pub fn amounts(&self) -> (Option<f64>, Option<f64>) {
        let form = self.form();
        (form.from_amount, form.to_amount)
    }

    pub fn is_swapping(&self) -> bool {
        self.swapping.load(Ordering::Acquire)
    }

    fn form(&self) -> MutexGuard<'_, FormState> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select the token on one side of the form.
    pub fn select_token(&self, side: Side, symbol: &str) -> Result<(), SwapError> {
        let spec = self
            .registry
            .get(symbol)
            .ok_or_else(|| SwapError::UnknownToken(symbol.to_string()))?;
        let mut form = self.form();
        match side {
            Side::From => form.from = spec.symbol.clone(),
            Side::To => form.to = spec.symbol.clone(),
        }
        Ok(())
    }

    /// Swap the two sides, amounts included.
    pub fn swap_positions(&self) {
        let mut form = self.form();
        let form = &mut *form;
        std::mem::swap(&mut form.from, &mut form.to);
        std::mem::swap(&mut form.from_amount, &mut form.to_amount);
    }

    /// Record `input` and return the displayed output estimate.
    ///
    /// Clears both amounts and returns `None` when disconnected or when
    /// `input` is not a positive number.
    pub fn estimate_output(&self, input: f64) -> Option<f64> {
        let mut form = self.form();
        if !self.backend.is_connected() || !input.is_finite() || input <= 0.0 {
            form.from_amount = None;
            form.to_amount = None;
            return None;
        }
        let estimate = input * ESTIMATE_RATE;
        form.from_amount = Some(input);
        form.to_amount = Some(estimate);
        Some(estimate)
    }

    /// Balance of `symbol` held by the session account, in raw units.
    ///
    /// Native entries and tokens without an address report the native
    /// balance. Every failure reads as `0`.
    pub async fn token_balance(&self, symbol: &str) -> u64 {
        let Some(holder) = self.backend.address() else {
            return 0;
        };
        let Some(spec) = self.registry.get(symbol) else {
            return 0;
        };

        let actor = match spec.address {
            Some(actor) if !spec.native => actor,
            _ => return self.backend.native_balance(holder).await,
        };

        let source = match (RemoteCall::ActorBalance { actor, holder }).to_source() {
            Ok(source) => source,
            Err(_) => return 0,
        };
        match self.backend.query(&source, holder).await {
            Ok(result) => balance_from_value(&result.value).unwrap_or(0),
            Err(e) => {
                warn!("swap: balance of {symbol} unavailable: {e}");
                0
            }
        }
    }

    /// Fetch balances for the selected pair. `None` while disconnected or
    /// without an address.
    pub async fn update_balances(&self) -> Option<BalanceView> {
        if !self.backend.is_connected() || self.backend.address().is_none() {
            return None;
        }
        let (from_symbol, to_symbol) = self.pair();
        let from = self.token_balance(&from_symbol).await;
        let to = self.token_balance(&to_symbol).await;
        Some(BalanceView {
            from_symbol,
            from,
            to_symbol,
            to,
        })
    }

    /// Swap `amount` of the "from" token into the "to" token.
    ///
    /// At most one swap runs at a time. On success both amounts are cleared.
    pub async fn execute_swap(&self, amount: f64) -> Result<RemoteResult, SwapError> {
        if !self.backend.is_connected() {
            return Err(SwapError::NotConnected);
        }
        if self
            .swapping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SwapError::InProgress);
        }
        let _guard = SwapGuard(&self.swapping);

        if !amount.is_finite() || amount <= 0.0 {
            return Err(SwapError::InvalidAmount(amount));
        }

        let (from_symbol, to_symbol) = self.pair();
        let from = self.lookup(&from_symbol)?;
        let to = self.lookup(&to_symbol)?;

        info!("swap: {amount} {} -> {}", from.symbol, to.symbol);
        let result = match (from.native, to.native) {
            (true, false) => {
                let token = listed(&to)?;
                self.backend.buy_tokens(token, amount).await?
            }
            (false, true) => {
                let token = listed(&from)?;
                self.backend.sell_tokens(token, amount).await?
            }
            _ => {
                return Err(SwapError::Unsupported {
                    from: from.symbol,
                    to: to.symbol,
                })
            }
        };

        let mut form = self.form();
        form.from_amount = None;
        form.to_amount = None;
        info!("swap: completed");
        Ok(result)
    }

    fn lookup(&self, symbol: &str) -> Result<TokenSpec, SwapError> {
        self.registry
            .get(symbol)
            .cloned()
            .ok_or_else(|| SwapError::UnknownToken(symbol.to_string()))
    }

    /// Close the backend session and clear the form amounts.
    pub fn disconnect(&self) {
        self.backend.close();
        let mut form = self.form();
        form.from_amount = None;
        form.to_amount = None;
    }

    /// Push balances to `sink` every `interval` while connected.
    ///
    /// Returns once the receiving side is dropped or the backend
    /// disconnects; spawn it with [`tokio::spawn`].
    pub async fn poll_balances(&self, interval: Duration, sink: mpsc::Sender<BalanceView>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if sink.is_closed() {
                debug!("swap: balance receiver dropped, stopping poll");
                return;
            }
            if !self.backend.is_connected() {
                debug!("swap: backend disconnected, stopping poll");
                return;
            }
            if let Some(view) = self.update_balances().await {
                if sink.send(view).await.is_err() {
                    debug!("swap: balance receiver dropped, stopping poll");
                    return;
                }
            }
        }
    }
}

fn listed(spec: &TokenSpec) -> Result<Address, SwapError> {
    spec.address
        .ok_or_else(|| SwapError::UnlistedToken(spec.symbol.clone()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// In-memory backend recording every swap it is asked to make.
    struct FakeBackend {
        connected: AtomicBool,
        address: Option<Address>,
        calls: Mutex<Vec<String>>,
        swap_delay: Duration,
        fail_swaps: bool,
        queries: AtomicUsize,
    }

    impl FakeBackend {
        fn connected() -> Self {
            Self {
                connected: AtomicBool::new(true),
                address: Some(Address::new(12)),
                calls: Mutex::new(Vec::new()),
                swap_delay: Duration::ZERO,
                fail_swaps: false,
                queries: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn swap(&self, call: String) -> Result<RemoteResult, ClientError> {
            tokio::time::sleep(self.swap_delay).await;
            self.calls.lock().unwrap().push(call);
            if self.fail_swaps {
                Err(ClientError::Remote {
                    operation: "transaction",
                    code: "FUNDS".into(),
                    message: "Insufficient funds".into(),
                })
            } else {
                Ok(RemoteResult::ok(true))
            }
        }
    }

    #[async_trait]
    impl SwapBackend for FakeBackend {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn address(&self) -> Option<Address> {
            self.address
        }

        async fn native_balance(&self, _holder: Address) -> u64 {
            1_000_000_000
        }

        async fn query(&self, source: &str, _: Address) -> Result<RemoteResult, ClientError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            assert_eq!(source, "(call #99 (balance #12))");
            Ok(RemoteResult::ok(json!(2_500_000)))
        }

        async fn buy_tokens(&self, token: Address, cvx: f64) -> Result<RemoteResult, ClientError> {
            self.swap(format!("buy {token} {cvx}")).await
        }

        async fn sell_tokens(
            &self,
            token: Address,
            tokens: f64,
        ) -> Result<RemoteResult, ClientError> {
            self.swap(format!("sell {token} {tokens}")).await
        }

        fn close(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    fn controller(backend: FakeBackend) -> SwapController<FakeBackend> {
        let registry = TokenRegistry::default().with_address("PAI", Address::new(99));
        SwapController::new(Arc::new(backend), registry)
    }

    #[test]
    fn defaults_to_cvx_for_pai() {
        let c = controller(FakeBackend::connected());
        assert_eq!(c.pair(), ("CVX".to_string(), "PAI".to_string()));
        assert_eq!(c.amounts(), (None, None));
    }

    #[test]
    fn select_and_swap_positions() {
        let c = controller(FakeBackend::connected());
        c.select_token(Side::To, "usdc").unwrap();
        assert_eq!(c.pair().1, "USDC");

        c.estimate_output(10.0);
        c.swap_positions();
        assert_eq!(c.pair(), ("USDC".to_string(), "CVX".to_string()));
        assert_eq!(c.amounts(), (Some(9.7), Some(10.0)));

        assert!(matches!(
            c.select_token(Side::From, "DOGE"),
            Err(SwapError::UnknownToken(_))
        ));
    }

    #[test]
    fn estimate_applies_rate() {
        let c = controller(FakeBackend::connected());
        assert_eq!(c.estimate_output(100.0), Some(97.0));
        assert_eq!(c.amounts(), (Some(100.0), Some(97.0)));
    }

    #[test]
    fn estimate_clears_on_bad_input() {
        let c = controller(FakeBackend::connected());
        c.estimate_output(100.0);
        assert_eq!(c.estimate_output(0.0), None);
        assert_eq!(c.amounts(), (None, None));
        assert_eq!(c.estimate_output(f64::NAN), None);
    }

    #[test]
    fn estimate_needs_connection() {
        let backend = FakeBackend::connected();
        backend.close();
        let c = controller(backend);
        assert_eq!(c.estimate_output(100.0), None);
    }

    #[tokio::test]
    async fn native_to_token_buys() {
        let c = controller(FakeBackend::connected());
        c.estimate_output(2.5);
        c.execute_swap(2.5).await.unwrap();
        assert_eq!(c.backend().calls(), vec!["buy #99 2.5"]);
        assert_eq!(c.amounts(), (None, None));
        assert!(!c.is_swapping());
    }

    #[tokio::test]
    async fn token_to_native_sells() {
        let c = controller(FakeBackend::connected());
        c.swap_positions();
        c.execute_swap(4.0).await.unwrap();
        assert_eq!(c.backend().calls(), vec!["sell #99 4"]);
    }

    #[tokio::test]
    async fn token_to_token_is_rejected() {
        let c = controller(FakeBackend::connected());
        c.select_token(Side::From, "USDC").unwrap();
        let err = c.execute_swap(1.0).await.unwrap_err();
        assert!(matches!(err, SwapError::Unsupported { .. }));
        assert!(err.to_string().contains("swap through CVX"));
        assert!(c.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn unlisted_token_is_rejected() {
        let c = controller(FakeBackend::connected());
        c.select_token(Side::To, "TOKEN").unwrap();
        assert!(matches!(
            c.execute_swap(1.0).await,
            Err(SwapError::UnlistedToken(s)) if s == "TOKEN"
        ));
    }

    #[tokio::test]
    async fn swap_requires_connection_and_positive_amount() {
        let backend = FakeBackend::connected();
        backend.close();
        let c = controller(backend);
        assert!(matches!(
            c.execute_swap(1.0).await,
            Err(SwapError::NotConnected)
        ));

        let c = controller(FakeBackend::connected());
        assert!(matches!(
            c.execute_swap(-1.0).await,
            Err(SwapError::InvalidAmount(_))
        ));
        assert!(!c.is_swapping());
    }

    #[tokio::test]
    async fn failed_swap_keeps_amounts_and_releases_guard() {
        let c = controller(FakeBackend {
            fail_swaps: true,
            ..FakeBackend::connected()
        });
        c.estimate_output(3.0);
        let err = c.execute_swap(3.0).await.unwrap_err();
        assert!(matches!(err, SwapError::Client(_)));
        assert_eq!(c.amounts(), (Some(3.0), Some(3.0 * ESTIMATE_RATE)));
        assert!(!c.is_swapping());
    }

    #[tokio::test]
    async fn overlapping_swap_is_refused() {
        let c = Arc::new(controller(FakeBackend {
            swap_delay: Duration::from_millis(200),
            ..FakeBackend::connected()
        }));

        let first = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.execute_swap(1.0).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(c.is_swapping());
        assert!(matches!(c.execute_swap(1.0).await, Err(SwapError::InProgress)));

        first.await.unwrap().unwrap();
        assert_eq!(c.backend().calls().len(), 1);
    }

    #[tokio::test]
    async fn balances_for_pair() {
        let c = controller(FakeBackend::connected());
        let view = c.update_balances().await.unwrap();
        assert_eq!(view.from_symbol, "CVX");
        assert_eq!(view.from, 1_000_000_000);
        assert_eq!(view.to, 2_500_000);
        assert_eq!(c.backend().queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_without_address_reports_native_balance() {
        let c = controller(FakeBackend::connected());
        assert_eq!(c.token_balance("USDC").await, 1_000_000_000);
        assert_eq!(c.token_balance("NOPE").await, 0);
        assert_eq!(c.backend().queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_balances_without_address() {
        let c = controller(FakeBackend {
            address: None,
            ..FakeBackend::connected()
        });
        assert!(c.update_balances().await.is_none());
        assert_eq!(c.token_balance("CVX").await, 0);
    }

    #[tokio::test]
    async fn disconnect_closes_backend() {
        let c = controller(FakeBackend::connected());
        c.estimate_output(5.0);
        c.disconnect();
        assert!(!c.backend().is_connected());
        assert_eq!(c.amounts(), (None, None));
    }

    #[tokio::test]
    async fn poll_stops_after_disconnect() {
        let c = Arc::new(controller(FakeBackend::connected()));
        let (tx, mut rx) = mpsc::channel(1);

        let poller = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.poll_balances(Duration::from_millis(10), tx).await })
        };

        assert!(rx.recv().await.is_some());
        c.disconnect();

        // The sender is dropped once the poller returns.
        tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await
        .expect("poller did not stop");
        poller.await.unwrap();
    }

    #[tokio::test]
    async fn poll_stops_when_receiver_dropped() {
        let c = Arc::new(controller(FakeBackend::connected()));
        let (tx, mut rx) = mpsc::channel(1);

        let poller = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.poll_balances(Duration::from_millis(10), tx).await })
        };

        let view = rx.recv().await.unwrap();
        assert_eq!(view.to_symbol, "PAI");
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), poller)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
