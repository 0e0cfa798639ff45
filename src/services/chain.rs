// Chain Client
// Minimal JSON-RPC access to the configured EVM endpoint: read-only
// eth_call plus a bounded transaction-receipt wait. Signing happens in
// the signer service; this client never holds keys.

use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::app_config::AppConfig;
use crate::utils::service_error::ServiceError;

static RPC_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .expect("Failed to create HTTP client for chain RPC")
});

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("RPC returned error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Transaction {0} not found on chain")]
    TxNotFound(String),

    #[error("Transaction {0} reverted")]
    Reverted(String),
}

impl From<ChainError> for ServiceError {
    fn from(error: ChainError) -> Self {
        match error {
            ChainError::TxNotFound(hash) => {
                ServiceError::NotFound(format!("Transaction {} not found on chain", hash))
            },
            ChainError::Reverted(hash) => {
                ServiceError::InvalidInput(format!("Transaction {} reverted", hash))
            },
            other => ServiceError::UpstreamFailure(other.to_string()),
        }
    }
}

/// Subset of an EVM transaction receipt we act on
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    /// "0x1" success, "0x0" reverted
    pub status: Option<String>,
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }
}

pub struct ChainClient {
    rpc_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ChainClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            rpc_url: config.rpc_url.clone(),
            poll_interval: Duration::from_secs(config.confirm_poll_interval_secs),
            max_wait: Duration::from_secs(config.confirm_max_wait_secs),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: Value = RPC_HTTP_CLIENT
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?
            .json()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        if let Some(error) = response.get("error") {
            return Err(ChainError::RpcError {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Read-only contract call; returns the raw hex result ("0x...")
    #[instrument(skip(self, call_data))]
    pub async fn eth_call(&self, to: &str, call_data: &str) -> Result<String, ChainError> {
        let result = self
            .rpc(
                "eth_call",
                json!([{ "to": to, "data": call_data }, "latest"]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Rpc("eth_call returned non-string result".to_string()))
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        let result = self
            .rpc("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| ChainError::Rpc(format!("malformed receipt: {}", e)))
    }

    /// Poll for a receipt until it appears or the wait bound elapses.
    /// A missing receipt after the bound is `TxNotFound`; a mined but
    /// failed transaction is `Reverted`.
    #[instrument(skip(self))]
    pub async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, ChainError> {
        let deadline = tokio::time::Instant::now() + self.max_wait;

        loop {
            match self.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if receipt.succeeded() {
                        debug!(block = ?receipt.block_number, "transaction confirmed");
                        return Ok(receipt);
                    }
                    return Err(ChainError::Reverted(tx_hash.to_string()));
                },
                Ok(None) => {},
                Err(e) => {
                    // Transient RPC failures don't abort the wait
                    warn!("receipt poll failed: {}", e);
                },
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(ChainError::TxNotFound(tx_hash.to_string()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
