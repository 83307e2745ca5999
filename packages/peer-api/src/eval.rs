//! Query and transaction types: `POST /api/v1/query`, `POST /api/v1/transact`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vortex::Address;

/// Request body for `POST /api/v1/query`.
///
/// ```json
/// { "address": "#12", "source": "(balance #12)" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    /// Account the expression is evaluated as.
    pub address: Address,
    /// Convex Lisp source to evaluate.
    pub source: String,
}

/// Request body for `POST /api/v1/transact`.
///
/// `seed` is the opaque signing material the peer signs with. It is `null`
/// when the session has no credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactRequest {
    pub address: Address,
    pub source: String,
    pub seed: Option<String>,
}

/// Cost metadata attached to transaction results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TxInfo {
    /// Execution cost in juice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub juice: Option<u64>,

    /// Total fee charged, in copper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response body for both query and transact.
///
/// A 2xx response may still describe a failed evaluation: when
/// `errorCode` is present and non-empty, `value` holds the error message.
///
/// ```json
/// { "value": 7 }
/// { "value": "Undeclared symbol: torus", "errorCode": "UNDECLARED" }
/// { "value": 1200, "info": { "juice": 50 } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResult {
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<TxInfo>,

    /// Fields this client does not interpret (`source`, `trace`, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteResult {
    /// A successful result carrying `value`.
    pub fn ok(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// A failed evaluation with the given code and message value.
    pub fn error(code: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            error_code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Attach juice cost metadata.
    pub fn with_juice(mut self, juice: u64) -> Self {
        self.info.get_or_insert_with(TxInfo::default).juice = Some(juice);
        self
    }

    /// The error code, if this result describes a failure. An empty code
    /// counts as no error.
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref().filter(|code| !code.is_empty())
    }

    /// Human-readable failure description: the value when it is meaningful,
    /// otherwise the code.
    pub fn error_message(&self) -> Option<String> {
        let code = self.error_code()?;
        let message = match &self.value {
            Value::Null | Value::Bool(false) => code.to_string(),
            Value::String(s) if s.is_empty() => code.to_string(),
            Value::Number(n) if n.as_f64() == Some(0.0) => code.to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Some(message)
    }

    pub fn juice(&self) -> Option<u64> {
        self.info.as_ref().and_then(|info| info.juice)
    }
}

/// Common error codes reported by Convex peers.
pub mod codes {
    pub const NOBODY: &str = "NOBODY";
    pub const UNDECLARED: &str = "UNDECLARED";
    pub const FUNDS: &str = "FUNDS";
    pub const JUICE: &str = "JUICE";
    pub const SEQUENCE: &str = "SEQUENCE";
    pub const TRUST: &str = "TRUST";
    pub const ARGUMENT: &str = "ARGUMENT";
    pub const STATE: &str = "STATE";
}
