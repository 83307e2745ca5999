//! WebAssembly bindings for the VorteX core and session libraries.
//!
//! A browser front end does its own `fetch` calls but should not re-implement
//! the amount scaling or the source templates. This package exposes both,
//! plus the peer URL layout. Compile with `wasm-pack build`.
//!
//! ## Encoding API: [`encode_call`], [`native_units`], [`token_units`], [`strip_marker`]
//!
//! ```js
//! import init, { encode_call, native_units } from './vortex_wasm.js';
//! await init();
//!
//! native_units(2.5);  // "2500000000"
//! const source = encode_call(JSON.stringify({ op: 'buy-tokens', token: '#99', cvx: 2.5 }));
//! // "(do (import torus.exchange :as torus) (torus/buy-tokens #99 2500000000))"
//! ```
//!
//! ## Peer API: [`PeerEndpoints`], [`error_message`]
//!
//! ```js
//! const peer = new PeerEndpoints('http://peer.convex.live:8080');
//! const reply = await fetch(peer.queryUrl, {
//!   method: 'POST',
//!   body: JSON.stringify({ address: '#12', source }),
//! }).then(r => r.text());
//! const failure = errorMessage(reply); // undefined on success
//! ```

use wasm_bindgen::prelude::*;

use vortex::{Address, RemoteCall};

/// One-time initialisation called at the start of every exported function.
///
/// Installs the `console_error_panic_hook` when the feature is enabled so
/// that Rust panics are forwarded to the browser console as readable errors
/// rather than appearing as generic "unreachable" WASM traps.
fn setup() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Scale a CVX amount to copper (×10⁹, truncated).
///
/// Returned as a decimal string because results can exceed
/// `Number.MAX_SAFE_INTEGER`. Throws on negative or non-finite input.
#[wasm_bindgen]
pub fn native_units(amount: f64) -> Result<String, JsValue> {
    setup();
    vortex::native_units(amount)
        .map(|units| units.to_string())
        .map_err(js_err)
}

/// Scale a token amount to raw units (×10⁶, truncated).
#[wasm_bindgen]
pub fn token_units(amount: f64) -> Result<String, JsValue> {
    setup();
    vortex::token_units(amount)
        .map(|units| units.to_string())
        .map_err(js_err)
}

/// `"#12"` → `"12"`. Throws when the input is not an address.
#[wasm_bindgen]
pub fn strip_marker(address: &str) -> Result<String, JsValue> {
    setup();
    Address::parse(address)
        .map(Address::without_marker)
        .map_err(js_err)
}

/// Render a JSON-described call as peer source text.
///
/// `json` is an object tagged by `op`:
///
/// ```json
/// { "op": "balance", "address": "#12" }
/// { "op": "sell-tokens", "token": "#99", "tokens": 2.5 }
/// { "op": "transfer", "to": "#13", "amount": 1000 }
/// ```
///
/// Throws on unknown operations, malformed addresses, or invalid amounts.
#[wasm_bindgen]
pub fn encode_call(json: &str) -> Result<String, JsValue> {
    setup();
    let call: RemoteCall = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("parse error: {e}")))?;
    call.to_source().map_err(js_err)
}

/// Whether `json` describes a call that must be sent as a transaction.
#[wasm_bindgen(js_name = isTransaction)]
pub fn is_transaction(json: &str) -> Result<bool, JsValue> {
    setup();
    let call: RemoteCall = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("parse error: {e}")))?;
    Ok(!call.is_read_only())
}

/// The failure described by a query/transact response body, if any.
///
/// Returns `undefined` for successful results. Throws when `json` is not a
/// result object.
#[wasm_bindgen(js_name = errorMessage)]
pub fn error_message(json: &str) -> Result<Option<String>, JsValue> {
    setup();
    let result: vortex_peer_api::RemoteResult = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("parse error: {e}")))?;
    Ok(result.error_message())
}

// ── Peer endpoints ────────────────────────────────────────────────────────────

/// URLs of the peer REST API under one base URL.
#[wasm_bindgen]
pub struct PeerEndpoints {
    inner: vortex_session::PeerEndpoints,
}

#[wasm_bindgen]
impl PeerEndpoints {
    #[wasm_bindgen(constructor)]
    pub fn new(base: &str) -> Self {
        setup();
        Self {
            inner: vortex_session::PeerEndpoints::new(base),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn base(&self) -> String {
        self.inner.base().to_string()
    }

    #[wasm_bindgen(getter, js_name = queryUrl)]
    pub fn query_url(&self) -> String {
        self.inner.query_url()
    }

    #[wasm_bindgen(getter, js_name = transactUrl)]
    pub fn transact_url(&self) -> String {
        self.inner.transact_url()
    }

    #[wasm_bindgen(getter, js_name = createAccountUrl)]
    pub fn create_account_url(&self) -> String {
        self.inner.create_account_url()
    }

    #[wasm_bindgen(getter, js_name = faucetUrl)]
    pub fn faucet_url(&self) -> String {
        self.inner.faucet_url()
    }

    /// Account record URL for `address` (`"#12"` or `"12"`).
    #[wasm_bindgen(js_name = accountUrl)]
    pub fn account_url(&self, address: &str) -> Result<String, JsValue> {
        let address = Address::parse(address).map_err(js_err)?;
        Ok(self.inner.account_url(address))
    }
}
