// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON client for an encryption gateway sidecar.
//!
//! | Route | Body | Response |
//! |-------|------|----------|
//! | `POST /v1/inputs` | contract, user, typed values | handles, input proof |
//! | `POST /v1/decrypt` | signed decryption request | typed values per handle |
//!
//! 401 and 403 responses are decryption denials; any other non-success
//! status is a request failure carrying the status and body.

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{EncryptedInput, EncryptedPayload, EncryptionGateway, GatewayError, Handle, Plaintext};
use crate::capability::SignedDecryptionRequest;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct WireValue {
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputsRequest {
    contract_address: String,
    user_address: String,
    values: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputsResponse {
    handles: Vec<String>,
    input_proof: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecryptRequest {
    handles: Vec<String>,
    contract_address: String,
    chain_id: u64,
    start_timestamp: u64,
    duration_days: u64,
    public_key: String,
    signature: String,
    signer: String,
}

#[derive(Debug, Deserialize)]
struct DecryptResponse {
    values: Vec<DecryptedEntry>,
}

#[derive(Debug, Deserialize)]
struct DecryptedEntry {
    handle: String,
    #[serde(flatten)]
    value: WireValue,
}

/// Gateway reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    http: Client,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        url::Url::parse(base_url)
            .map_err(|e| GatewayError::Request(format!("invalid gateway URL: {e}")))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let request_id = Uuid::new_v4().to_string();
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("X-Request-Id", &request_id)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("POST {path} failed: {e}")))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Unauthorized(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Request(format!(
                "POST {path} returned {status}: {body}"
            )));
        }

        debug!(path, request_id = %request_id, "Gateway request completed");
        response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }
}

#[async_trait]
impl EncryptionGateway for HttpGateway {
    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedPayload, GatewayError> {
        let body = InputsRequest {
            contract_address: input.contract().to_string(),
            user_address: input.sender().to_string(),
            values: input.values().iter().map(to_wire).collect(),
        };
        let response: InputsResponse = self.post_json("/v1/inputs", &body).await?;

        let handles = response
            .handles
            .iter()
            .map(|h| parse_handle(h))
            .collect::<Result<Vec<_>, _>>()?;
        if handles.len() != input.len() {
            return Err(GatewayError::InvalidResponse(format!(
                "requested {} handles, received {}",
                input.len(),
                handles.len()
            )));
        }
        let input_proof = response
            .input_proof
            .parse::<Bytes>()
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid input proof: {e}")))?;

        Ok(EncryptedPayload {
            handles,
            input_proof,
        })
    }

    async fn decrypt(
        &self,
        request: &SignedDecryptionRequest,
    ) -> Result<HashMap<Handle, Plaintext>, GatewayError> {
        let response: DecryptResponse = self
            .post_json("/v1/decrypt", &decrypt_body(request))
            .await?;

        response
            .values
            .into_iter()
            .map(|entry| Ok((parse_handle(&entry.handle)?, from_wire(&entry.value)?)))
            .collect()
    }
}

fn decrypt_body(signed: &SignedDecryptionRequest) -> DecryptRequest {
    let request = &signed.request;
    DecryptRequest {
        handles: request.handles.iter().map(ToString::to_string).collect(),
        contract_address: request.contract_address.to_string(),
        chain_id: request.chain_id,
        start_timestamp: request.start_timestamp,
        duration_days: request.duration_days,
        public_key: alloy::hex::encode_prefixed(&request.public_key),
        signature: alloy::hex::encode_prefixed(signed.signature.as_bytes()),
        signer: signed.signer.to_string(),
    }
}

fn to_wire(value: &Plaintext) -> WireValue {
    let encoded = match value {
        Plaintext::Uint(v) => Value::String(v.to_string()),
        Plaintext::Address(a) => Value::String(a.to_string()),
        Plaintext::Bool(b) => Value::Bool(*b),
    };
    WireValue {
        kind: value.type_name().to_string(),
        value: encoded,
    }
}

fn from_wire(wire: &WireValue) -> Result<Plaintext, GatewayError> {
    let invalid = || GatewayError::InvalidResponse(format!("invalid {} value", wire.kind));
    match (wire.kind.as_str(), &wire.value) {
        ("uint256", Value::String(s)) => s.parse::<U256>().map(Plaintext::Uint).map_err(|_| invalid()),
        ("address", Value::String(s)) => {
            s.parse::<Address>().map(Plaintext::Address).map_err(|_| invalid())
        }
        ("bool", Value::Bool(b)) => Ok(Plaintext::Bool(*b)),
        (other, _) if !matches!(other, "uint256" | "address" | "bool") => Err(
            GatewayError::InvalidResponse(format!("unsupported value type: {other}")),
        ),
        _ => Err(invalid()),
    }
}

fn parse_handle(raw: &str) -> Result<Handle, GatewayError> {
    raw.parse::<B256>()
        .map(Handle)
        .map_err(|_| GatewayError::InvalidResponse(format!("invalid handle: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{sign_decryption_request, CapabilitySecret, DecryptionRequest};
    use serde_json::json;

    #[test]
    fn plaintexts_round_trip_through_wire_values() {
        for value in [
            Plaintext::Uint(U256::from(500_000_000_000_000_000u64)),
            Plaintext::Address(Address::repeat_byte(0xab)),
            Plaintext::Bool(false),
        ] {
            assert_eq!(from_wire(&to_wire(&value)).unwrap(), value);
        }
    }

    #[test]
    fn decrypted_entries_parse_from_json() {
        let body = json!({
            "values": [
                { "handle": format!("0x{}", "11".repeat(32)), "type": "uint256", "value": "42" },
                { "handle": format!("0x{}", "22".repeat(32)), "type": "bool", "value": true }
            ]
        });
        let parsed: DecryptResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.values.len(), 2);
        assert_eq!(
            from_wire(&parsed.values[0].value).unwrap(),
            Plaintext::Uint(U256::from(42u8))
        );
        assert_eq!(
            parse_handle(&parsed.values[1].handle).unwrap(),
            Handle(B256::repeat_byte(0x22))
        );
    }

    #[test]
    fn malformed_wire_values_are_rejected() {
        let bad = WireValue {
            kind: "uint256".to_string(),
            value: json!("not-a-number"),
        };
        assert!(matches!(from_wire(&bad), Err(GatewayError::InvalidResponse(_))));

        let unknown = WireValue {
            kind: "bytes".to_string(),
            value: json!("0x"),
        };
        assert!(from_wire(&unknown).unwrap_err().to_string().contains("unsupported"));
        assert!(parse_handle("0x1234").is_err());
    }

    #[test]
    fn decrypt_body_carries_signature_not_key() {
        let secret = CapabilitySecret::random();
        let request = DecryptionRequest::new(
            vec![Handle(B256::repeat_byte(1))],
            Address::repeat_byte(0xcc),
            11155111,
            10,
        );
        let signed = sign_decryption_request(&secret, request).unwrap();
        let body = serde_json::to_value(decrypt_body(&signed)).unwrap();

        assert_eq!(body["chainId"], json!(11155111));
        assert_eq!(body["durationDays"], json!(10));
        assert_eq!(body["signature"].as_str().unwrap().len(), 2 + 130);
        let printed = body.to_string();
        assert!(!printed.contains(secret.expose_hex().trim_start_matches("0x")));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpGateway::new("not a url").is_err());
        let gateway = HttpGateway::new("http://127.0.0.1:8787/").unwrap();
        assert_eq!(gateway.base_url(), "http://127.0.0.1:8787");
    }
}
