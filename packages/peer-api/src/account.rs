//! Account provisioning types: `createAccount`, `faucet`, `accounts/{n}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vortex::Address;

/// Request body for `POST /api/v1/createAccount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateAccountRequest {
    /// Hex-encoded Ed25519 public key the new account is controlled by.
    #[serde(rename = "accountKey")]
    pub account_key: String,
}

/// Response body for a successful `POST /api/v1/createAccount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateAccountResponse {
    /// The newly issued account.
    pub address: Address,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for `POST /api/v1/faucet`.
///
/// `amount` is a decimal string of copper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaucetRequest {
    pub address: Address,
    pub amount: String,
}

/// Response body for `GET /api/v1/accounts/{n}`.
///
/// Peers include more fields than listed here; they are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    /// Native balance in copper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,

    /// `"user"` or `"actor"`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_account_request_uses_camel_case_key() {
        let req = CreateAccountRequest {
            account_key: "abcd".into(),
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"accountKey":"abcd"}));
    }

    #[test]
    fn create_account_response_accepts_numeric_address() {
        let resp: CreateAccountResponse = serde_json::from_str(r#"{"address":1337}"#).unwrap();
        assert_eq!(resp.address, Address::new(1337));
    }

    #[test]
    fn create_account_response_requires_address() {
        assert!(serde_json::from_str::<CreateAccountResponse>(r#"{"ok":true}"#).is_err());
    }

    #[test]
    fn account_info_parses_peer_shape() {
        let json = r#"{
            "address": 12,
            "balance": 9000,
            "sequence": 4,
            "type": "user",
            "memorySize": 120,
            "allowance": 0
        }"#;
        let info: AccountInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.address, Some(Address::new(12)));
        assert_eq!(info.balance, Some(9000));
        assert_eq!(info.account_type.as_deref(), Some("user"));
        assert_eq!(info.memory_size, Some(120));
        assert_eq!(info.extra.get("allowance"), Some(&json!(0)));
    }
}
