// Image Generator Client
// Calls the external image-generation service with the user's identity
// snapshot. The service replies with either a hosted URL or inline
// base64 bytes; both are surfaced as one enum.

use base64::Engine;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::app_config::AppConfig;
use crate::services::identity::IdentityProfile;

// Generation runs are slow; allow well over the usual request budget
static GENERATOR_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .expect("Failed to create HTTP client for image generator")
});

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator request failed: {0}")]
    Request(String),

    #[error("Generator returned {0}: {1}")]
    Status(u16, String),

    #[error("Generator response missing image payload")]
    EmptyResponse,

    #[error("Generator returned invalid base64: {0}")]
    BadEncoding(String),
}

#[derive(Debug, Deserialize)]
struct GeneratorResponse {
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(rename = "imageBase64")]
    image_base64: Option<String>,
}

/// Image as produced by the generator
pub enum GeneratedImage {
    Url(String),
    Bytes(Vec<u8>),
}

pub struct GeneratorClient {
    base_url: String,
}

impl GeneratorClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base_url: config.generator_url.clone(),
        }
    }

    #[instrument(skip(self, profile), fields(fid = profile.fid))]
    pub async fn generate(
        &self,
        generation_id: Uuid,
        profile: &IdentityProfile,
    ) -> Result<GeneratedImage, GeneratorError> {
        let body = json!({
            "fid": profile.fid,
            "pfp_url": profile.pfp_url,
            "bio": profile.bio,
            "follower_count": profile.follower_count,
            "power_badge": profile.has_badge,
            "generation_id": generation_id.to_string(),
        });

        let response = GENERATOR_HTTP_CLIENT
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Status(status.as_u16(), detail));
        }

        let payload: GeneratorResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Request(e.to_string()))?;

        if let Some(encoded) = payload.image_base64 {
            let stripped = encoded
                .split_once(',')
                .map(|(_, data)| data.to_string())
                .unwrap_or(encoded);
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(stripped.as_bytes())
                .map_err(|e| GeneratorError::BadEncoding(e.to_string()))?;
            return Ok(GeneratedImage::Bytes(bytes));
        }

        if let Some(url) = payload.image_url {
            return Ok(GeneratedImage::Url(url));
        }

        Err(GeneratorError::EmptyResponse)
    }
}
