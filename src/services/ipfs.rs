// IPFS Pinning Client
// Uploads image bytes and metadata JSON to the pinning service and
// builds the NFT metadata document. URIs are stored in `ipfs://` form;
// the gateway helper converts them for HTTP consumers.

use once_cell::sync::Lazy;
use reqwest::multipart;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

use crate::app_config::AppConfig;
use crate::utils::service_error::ServiceError;

static PINNING_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .expect("Failed to create HTTP client for IPFS pinning")
});

#[derive(Debug, Error)]
pub enum IpfsError {
    #[error("Pinning request failed: {0}")]
    Request(String),

    #[error("Pinning service returned {0}: {1}")]
    Status(u16, String),

    #[error("Pinning response missing CID")]
    MissingCid,
}

impl From<IpfsError> for ServiceError {
    fn from(error: IpfsError) -> Self {
        ServiceError::UpstreamFailure(error.to_string())
    }
}

pub struct PinningClient {
    api_base: String,
    jwt: String,
    gateway: String,
}

impl PinningClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_base: config.pinata_api_base.clone(),
            jwt: config.pinata_jwt.clone(),
            gateway: config.ipfs_gateway.clone(),
        }
    }

    /// Pin raw image bytes; returns an `ipfs://` URI
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn pin_image(&self, name: &str, bytes: Vec<u8>) -> Result<String, IpfsError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str("image/png")
            .map_err(|e| IpfsError::Request(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("network", "public");

        let response = PINNING_HTTP_CLIENT
            .post(format!("{}/v3/files", self.api_base))
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IpfsError::Request(e.to_string()))?;

        self.extract_cid(response).await
    }

    /// Pin a metadata JSON document; returns an `ipfs://` URI
    #[instrument(skip(self, metadata))]
    pub async fn pin_json(&self, name: &str, metadata: &Value) -> Result<String, IpfsError> {
        let bytes = serde_json::to_vec(metadata).map_err(|e| IpfsError::Request(e.to_string()))?;
        let part = multipart::Part::bytes(bytes)
            .file_name(format!("{}.json", name))
            .mime_str("application/json")
            .map_err(|e| IpfsError::Request(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("network", "public");

        let response = PINNING_HTTP_CLIENT
            .post(format!("{}/v3/files", self.api_base))
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IpfsError::Request(e.to_string()))?;

        self.extract_cid(response).await
    }

    async fn extract_cid(&self, response: reqwest::Response) -> Result<String, IpfsError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(IpfsError::Status(status.as_u16(), detail));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IpfsError::Request(e.to_string()))?;

        // v3 nests under data.cid; older responses used IpfsHash
        let cid = body
            .pointer("/data/cid")
            .or_else(|| body.get("IpfsHash"))
            .and_then(Value::as_str)
            .ok_or(IpfsError::MissingCid)?;

        Ok(format!("ipfs://{}", cid))
    }

    /// Convert an `ipfs://` URI to its gateway HTTP form; other URLs pass
    /// through unchanged
    pub fn to_http_url(&self, uri: &str) -> String {
        match uri.strip_prefix("ipfs://") {
            Some(cid) => format!("{}/{}", self.gateway.trim_end_matches('/'), cid),
            None => uri.to_string(),
        }
    }
}

/// NFT metadata document for a minted generation
pub fn build_nft_metadata(
    token_id: i64,
    fid: i64,
    username: Option<&str>,
    image_uri: &str,
) -> Value {
    let handle = username.unwrap_or("unknown");
    json!({
        "name": format!("FID MFER #{}", token_id),
        "description": format!(
            "A unique mfer generated for @{} (FID {}) on Farcaster.",
            handle, fid
        ),
        "image": image_uri,
        "attributes": [
            { "trait_type": "FID", "value": fid },
            { "trait_type": "Username", "value": handle },
            { "trait_type": "Generation", "value": 1 },
        ],
    })
}
