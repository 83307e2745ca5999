//! Typed remote calls and their encoding as Convex Lisp source.
//!
//! Every expression this client sends to a peer is described by a
//! [`RemoteCall`]. Arguments are either validated [`Address`]es or integer
//! unit amounts, so the rendered source can never contain caller-supplied
//! text. Unit scaling (see [`crate::units`]) happens here, in one place,
//! before the arguments are rendered.
//!
//! # Shape of the rendered source
//!
//! ```text
//! (+ 2 2 2 1)                                                   ; handshake
//! (balance #12)                                                 ; core form
//! (do (import torus.exchange :as torus) (torus/buy-tokens #99 2500000000))
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::units::{Decimals, UnitsError};

/// Value the peer must return for [`RemoteCall::Handshake`].
pub const HANDSHAKE_RESULT: i64 = 7;

/// Value the peer returns for [`RemoteCall::ProbeExchange`] when the
/// exchange module is deployed.
pub const EXCHANGE_PROBE_RESULT: &str = "Torus available";

/// Errors raised while encoding a [`RemoteCall`].
#[derive(Debug, Error, PartialEq)]
pub enum CallError {
    #[error("invalid {field}: {source}")]
    InvalidAmount {
        field: &'static str,
        #[source]
        source: UnitsError,
    },
}

/// A remote operation understood by the peer.
///
/// Amount fields typed as `f64` are display amounts and are scaled by the
/// encoder (`cvx` by 10^9, `tokens` by 10^6). Fields typed as `u64` are
/// already in integer units and are sent unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum RemoteCall {
    /// Connectivity check; must evaluate to [`HANDSHAKE_RESULT`].
    Handshake,
    /// Checks whether `torus.exchange` is deployed on the peer.
    ProbeExchange,
    /// Native coin balance of an account.
    Balance { address: Address },
    /// Native coin transfer, in copper.
    Transfer { to: Address, amount: u64 },
    /// `convex.fungible` balance of `holder` in `token`.
    TokenBalance { token: Address, holder: Address },
    /// Balance reported by the token actor itself via `(call …)`.
    ActorBalance { actor: Address, holder: Address },
    /// `convex.fungible` transfer, in raw token units.
    TransferToken {
        token: Address,
        to: Address,
        amount: u64,
    },
    BuyTokens { token: Address, cvx: f64 },
    SellTokens { token: Address, tokens: f64 },
    BuyCvx { token: Address, tokens: f64 },
    SellCvx { token: Address, cvx: f64 },
    GetMarket { token: Address },
    /// Token output quoted for spending `cvx`.
    Price { token: Address, cvx: f64 },
    AddLiquidity {
        token: Address,
        cvx: f64,
        tokens: f64,
    },
    RemoveLiquidity { token: Address, shares: u64 },
    CreateMarket {
        token: Address,
        cvx: f64,
        tokens: f64,
    },
}

impl RemoteCall {
    /// `true` for calls that only read state and go through `query`.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            RemoteCall::Handshake
                | RemoteCall::ProbeExchange
                | RemoteCall::Balance { .. }
                | RemoteCall::TokenBalance { .. }
                | RemoteCall::ActorBalance { .. }
                | RemoteCall::GetMarket { .. }
                | RemoteCall::Price { .. }
        )
    }

    /// Render this call as peer source text.
    pub fn to_source(&self) -> Result<String, CallError> {
        Ok(encode(&self.form()?))
    }

    fn form(&self) -> Result<Form, CallError> {
        use Arg::{Address as A, Units as U};

        let form = match self {
            RemoteCall::Handshake => Form::core("+", vec![U(2), U(2), U(2), U(1)]),
            RemoteCall::ProbeExchange => Form {
                import: Some(Module::Exchange),
                body: Expr::Text(EXCHANGE_PROBE_RESULT),
            },
            RemoteCall::Balance { address } => Form::core("balance", vec![A(*address)]),
            RemoteCall::Transfer { to, amount } => {
                Form::core("transfer", vec![A(*to), U(*amount)])
            }
            RemoteCall::TokenBalance { token, holder } => {
                Form::module(Module::Fungible, "balance", vec![A(*token), A(*holder)])
            }
            RemoteCall::ActorBalance { actor, holder } => Form::core(
                "call",
                vec![
                    A(*actor),
                    Arg::Expr(Box::new(Expr::invoke(None, "balance", vec![A(*holder)]))),
                ],
            ),
            RemoteCall::TransferToken { token, to, amount } => Form::module(
                Module::Fungible,
                "transfer",
                vec![A(*token), A(*to), U(*amount)],
            ),
            RemoteCall::BuyTokens { token, cvx } => Form::module(
                Module::Exchange,
                "buy-tokens",
                vec![A(*token), U(native("cvx", *cvx)?)],
            ),
            RemoteCall::SellTokens { token, tokens } => Form::module(
                Module::Exchange,
                "sell-tokens",
                vec![A(*token), U(token_amount("tokens", *tokens)?)],
            ),
            RemoteCall::BuyCvx { token, tokens } => Form::module(
                Module::Exchange,
                "buy-cvx",
                vec![A(*token), U(token_amount("tokens", *tokens)?)],
            ),
            RemoteCall::SellCvx { token, cvx } => Form::module(
                Module::Exchange,
                "sell-cvx",
                vec![A(*token), U(native("cvx", *cvx)?)],
            ),
            RemoteCall::GetMarket { token } => {
                Form::module(Module::Exchange, "get-market", vec![A(*token)])
            }
            RemoteCall::Price { token, cvx } => Form::module(
                Module::Exchange,
                "price",
                vec![A(*token), U(native("cvx", *cvx)?)],
            ),
            RemoteCall::AddLiquidity { token, cvx, tokens } => Form::module(
                Module::Exchange,
                "add-liquidity",
                vec![
                    A(*token),
                    U(native("cvx", *cvx)?),
                    U(token_amount("tokens", *tokens)?),
                ],
            ),
            RemoteCall::RemoveLiquidity { token, shares } => Form::module(
                Module::Exchange,
                "remove-liquidity",
                vec![A(*token), U(*shares)],
            ),
            RemoteCall::CreateMarket { token, cvx, tokens } => Form::module(
                Module::Exchange,
                "create-market",
                vec![
                    A(*token),
                    U(native("cvx", *cvx)?),
                    U(token_amount("tokens", *tokens)?),
                ],
            ),
        };
        Ok(form)
    }
}

fn native(field: &'static str, amount: f64) -> Result<u64, CallError> {
    Decimals::NATIVE
        .to_units(amount)
        .map_err(|source| CallError::InvalidAmount { field, source })
}

// TODO: take decimals from the token's metadata once the exchange exposes it.
fn token_amount(field: &'static str, amount: f64) -> Result<u64, CallError> {
    Decimals::TOKEN
        .to_units(amount)
        .map_err(|source| CallError::InvalidAmount { field, source })
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Module {
    Exchange,
    Fungible,
}

impl Module {
    fn path(self) -> &'static str {
        match self {
            Module::Exchange => "torus.exchange",
            Module::Fungible => "convex.fungible",
        }
    }

    fn alias(self) -> &'static str {
        match self {
            Module::Exchange => "torus",
            Module::Fungible => "fungible",
        }
    }
}

#[derive(Debug)]
enum Arg {
    Address(Address),
    Units(u64),
    Expr(Box<Expr>),
}

#[derive(Debug)]
enum Expr {
    Invoke {
        module: Option<Module>,
        function: &'static str,
        args: Vec<Arg>,
    },
    Text(&'static str),
}

impl Expr {
    fn invoke(module: Option<Module>, function: &'static str, args: Vec<Arg>) -> Self {
        Expr::Invoke {
            module,
            function,
            args,
        }
    }
}

/// A top-level expression plus the module it needs imported.
#[derive(Debug)]
struct Form {
    import: Option<Module>,
    body: Expr,
}

impl Form {
    fn core(function: &'static str, args: Vec<Arg>) -> Self {
        Self {
            import: None,
            body: Expr::invoke(None, function, args),
        }
    }

    fn module(module: Module, function: &'static str, args: Vec<Arg>) -> Self {
        Self {
            import: Some(module),
            body: Expr::invoke(Some(module), function, args),
        }
    }
}

fn encode(form: &Form) -> String {
    let mut body = String::new();
    write_expr(&mut body, &form.body);
    match form.import {
        Some(module) => format!(
            "(do (import {} :as {}) {})",
            module.path(),
            module.alias(),
            body
        ),
        None => body,
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Text(text) => out.push_str(&format!("{text:?}")),
        Expr::Invoke {
            module,
            function,
            args,
        } => {
            out.push('(');
            if let Some(module) = module {
                out.push_str(module.alias());
                out.push('/');
            }
            out.push_str(function);
            for arg in args {
                out.push(' ');
                match arg {
                    Arg::Address(address) => out.push_str(&address.to_string()),
                    Arg::Units(units) => out.push_str(&units.to_string()),
                    Arg::Expr(inner) => write_expr(out, inner),
                }
            }
            out.push(')');
        }
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::new(n)
    }

    #[test]
    fn handshake_source() {
        assert_eq!(RemoteCall::Handshake.to_source().unwrap(), "(+ 2 2 2 1)");
    }

    #[test]
    fn probe_source() {
        assert_eq!(
            RemoteCall::ProbeExchange.to_source().unwrap(),
            r#"(do (import torus.exchange :as torus) "Torus available")"#
        );
    }

    #[test]
    fn balance_source() {
        let call = RemoteCall::Balance { address: addr(12) };
        assert_eq!(call.to_source().unwrap(), "(balance #12)");
    }

    #[test]
    fn buy_tokens_scales_native_amount() {
        let call = RemoteCall::BuyTokens {
            token: addr(99),
            cvx: 2.5,
        };
        assert_eq!(
            call.to_source().unwrap(),
            "(do (import torus.exchange :as torus) (torus/buy-tokens #99 2500000000))"
        );
    }

    #[test]
    fn sell_tokens_scales_token_amount() {
        let call = RemoteCall::SellTokens {
            token: addr(99),
            tokens: 2.5,
        };
        assert_eq!(
            call.to_source().unwrap(),
            "(do (import torus.exchange :as torus) (torus/sell-tokens #99 2500000))"
        );
    }

    #[test]
    fn add_liquidity_scales_both_sides() {
        let call = RemoteCall::AddLiquidity {
            token: addr(99),
            cvx: 1.0,
            tokens: 3.0,
        };
        assert_eq!(
            call.to_source().unwrap(),
            "(do (import torus.exchange :as torus) (torus/add-liquidity #99 1000000000 3000000))"
        );
    }

    #[test]
    fn remove_liquidity_shares_are_unscaled() {
        let call = RemoteCall::RemoveLiquidity {
            token: addr(99),
            shares: 42,
        };
        assert!(call.to_source().unwrap().ends_with("(torus/remove-liquidity #99 42))"));
    }

    #[test]
    fn token_balance_imports_fungible() {
        let call = RemoteCall::TokenBalance {
            token: addr(99),
            holder: addr(12),
        };
        assert_eq!(
            call.to_source().unwrap(),
            "(do (import convex.fungible :as fungible) (fungible/balance #99 #12))"
        );
    }

    #[test]
    fn actor_balance_nests_unqualified_call() {
        let call = RemoteCall::ActorBalance {
            actor: addr(99),
            holder: addr(12),
        };
        assert_eq!(call.to_source().unwrap(), "(call #99 (balance #12))");
    }

    #[test]
    fn transfer_amount_is_raw() {
        let call = RemoteCall::Transfer {
            to: addr(13),
            amount: 1000,
        };
        assert_eq!(call.to_source().unwrap(), "(transfer #13 1000)");
    }

    #[test]
    fn invalid_amount_names_the_field() {
        let call = RemoteCall::CreateMarket {
            token: addr(99),
            cvx: 1.0,
            tokens: -4.0,
        };
        assert_eq!(
            call.to_source(),
            Err(CallError::InvalidAmount {
                field: "tokens",
                source: UnitsError::Negative(-4.0)
            })
        );
    }

    #[test]
    fn read_only_classification() {
        assert!(RemoteCall::GetMarket { token: addr(1) }.is_read_only());
        assert!(RemoteCall::Price {
            token: addr(1),
            cvx: 1.0
        }
        .is_read_only());
        assert!(!RemoteCall::BuyCvx {
            token: addr(1),
            tokens: 1.0
        }
        .is_read_only());
    }

    #[test]
    fn deserialises_from_tagged_json() {
        let call: RemoteCall =
            serde_json::from_str(r##"{"op":"sell-cvx","token":"#7","cvx":0.5}"##).unwrap();
        assert_eq!(
            call,
            RemoteCall::SellCvx {
                token: addr(7),
                cvx: 0.5
            }
        );
    }
}
