//! `torus.exchange` and token operations on [`PeerClient`].
//!
//! | Method | Kind | Amounts |
//! |--------|------|---------|
//! | [`buy_tokens`](PeerClient::buy_tokens) | transaction | CVX, scaled ×10⁹ |
//! | [`sell_tokens`](PeerClient::sell_tokens) | transaction | tokens, scaled ×10⁶ |
//! | [`buy_cvx`](PeerClient::buy_cvx) | transaction | tokens, scaled ×10⁶ |
//! | [`sell_cvx`](PeerClient::sell_cvx) | transaction | CVX, scaled ×10⁹ |
//! | [`add_liquidity`](PeerClient::add_liquidity) | transaction | CVX ×10⁹, tokens ×10⁶ |
//! | [`remove_liquidity`](PeerClient::remove_liquidity) | transaction | raw shares |
//! | [`create_market`](PeerClient::create_market) | transaction | CVX ×10⁹, tokens ×10⁶ |
//! | [`transfer_token`](PeerClient::transfer_token) | transaction | raw units |
//! | [`transfer`](PeerClient::transfer) | transaction | raw copper |
//! | [`get_market`](PeerClient::get_market) | query | |
//! | [`get_buy_price`](PeerClient::get_buy_price) | query | CVX ×10⁹ in, tokens ÷10⁶ out |
//!
//! Invalid amounts (negative, non-finite, overflowing) are rejected before
//! anything is sent.

use serde_json::Value;
use tracing::{error, info, warn};

use vortex::{Address, Decimals, RemoteCall};
use vortex_peer_api::RemoteResult;

use crate::error::ClientError;
use crate::peer::PeerClient;

impl PeerClient {
    /// Spend `cvx_amount` CVX on `token`.
    pub async fn buy_tokens(
        &self,
        token: Address,
        cvx_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: buying {token} with {cvx_amount} CVX");
        self.transact_call(&RemoteCall::BuyTokens {
            token,
            cvx: cvx_amount,
        })
        .await
    }

    /// Sell `token_amount` of `token` for CVX.
    pub async fn sell_tokens(
        &self,
        token: Address,
        token_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: selling {token_amount} of {token} for CVX");
        self.transact_call(&RemoteCall::SellTokens {
            token,
            tokens: token_amount,
        })
        .await
    }

    pub async fn buy_cvx(
        &self,
        token: Address,
        token_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: buying CVX with {token_amount} of {token}");
        self.transact_call(&RemoteCall::BuyCvx {
            token,
            tokens: token_amount,
        })
        .await
    }

    pub async fn sell_cvx(
        &self,
        token: Address,
        cvx_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: selling {cvx_amount} CVX for {token}");
        self.transact_call(&RemoteCall::SellCvx {
            token,
            cvx: cvx_amount,
        })
        .await
    }

    /// Market state for `token`, evaluated as `viewer`.
    ///
    /// Returns `None` when the lookup fails for any reason.
    pub async fn get_market(&self, token: Address, viewer: Address) -> Option<Value> {
        match self
            .query_call(&RemoteCall::GetMarket { token }, viewer)
            .await
        {
            Ok(result) => Some(result.value),
            Err(e) => {
                error!("dex: failed to get market for {token}: {e}");
                None
            }
        }
    }

    /// Tokens received for spending `cvx_amount` CVX, in display units.
    ///
    /// Peer failures read as `0.0`; an invalid `cvx_amount` is still an error.
    pub async fn get_buy_price(
        &self,
        token: Address,
        cvx_amount: f64,
        viewer: Address,
    ) -> Result<f64, ClientError> {
        let source = RemoteCall::Price {
            token,
            cvx: cvx_amount,
        }
        .to_source()?;

        let result = match self.query(&source, viewer).await {
            Ok(result) => result,
            Err(e) => {
                error!("dex: failed to get price for {token}: {e}");
                return Ok(0.0);
            }
        };

        match result.value.as_f64() {
            Some(raw) => Ok(Decimals::TOKEN.from_units(raw)),
            None => {
                warn!("dex: non-numeric price for {token}: {}", result.value);
                Ok(0.0)
            }
        }
    }

    pub async fn add_liquidity(
        &self,
        token: Address,
        cvx_amount: f64,
        token_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: adding liquidity to {token}: {cvx_amount} CVX, {token_amount} tokens");
        self.transact_call(&RemoteCall::AddLiquidity {
            token,
            cvx: cvx_amount,
            tokens: token_amount,
        })
        .await
    }

    /// Withdraw `shares` liquidity shares. `shares` is sent unscaled.
    pub async fn remove_liquidity(
        &self,
        token: Address,
        shares: u64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: removing {shares} shares from {token}");
        self.transact_call(&RemoteCall::RemoveLiquidity { token, shares })
            .await
    }

    /// Open a market for `token` seeded with the given reserves.
    pub async fn create_market(
        &self,
        token: Address,
        cvx_amount: f64,
        token_amount: f64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: creating market for {token}: {cvx_amount} CVX, {token_amount} tokens");
        self.transact_call(&RemoteCall::CreateMarket {
            token,
            cvx: cvx_amount,
            tokens: token_amount,
        })
        .await
    }

    /// Send `amount` raw units of `token` to `to`.
    pub async fn transfer_token(
        &self,
        token: Address,
        to: Address,
        amount: u64,
    ) -> Result<RemoteResult, ClientError> {
        info!("dex: transferring {amount} of {token} to {to}");
        self.transact_call(&RemoteCall::TransferToken { token, to, amount })
            .await
    }

    /// Send `amount` copper to `to`.
    pub async fn transfer(&self, to: Address, amount: u64) -> Result<RemoteResult, ClientError> {
        info!("dex: transferring {amount} copper to {to}");
        self.transact_call(&RemoteCall::Transfer { to, amount })
            .await
    }
}
