// Notification Service
// Best-effort pushes through the directory service's notification API.
// Failures are logged and swallowed; no caller ever fails because a
// notification did not go out.

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::AppConfig;

static NOTIFICATION_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client for notifications")
});

pub struct NotificationService {
    api_base: String,
    api_key: String,
    app_url: String,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_base: config.neynar_api_base.clone(),
            api_key: config.neynar_api_key.clone(),
            app_url: config.app_url.clone(),
        }
    }

    /// Fire-and-forget push to a single FID
    pub async fn notify(&self, fid: i64, title: &str, body: &str) {
        let payload = json!({
            "target_fids": [fid],
            "notification": {
                "title": title,
                "body": body,
                "target_url": self.app_url,
            },
        });

        let result = NOTIFICATION_HTTP_CLIENT
            .post(format!(
                "{}/v2/farcaster/frame/notifications",
                self.api_base
            ))
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(fid, "notification sent");
            },
            Ok(response) => {
                warn!(fid, status = %response.status(), "notification rejected");
            },
            Err(e) => {
                warn!(fid, "notification failed: {}", e);
            },
        }
    }

    pub async fn notify_mint_confirmed(&self, fid: i64, token_id: i64) {
        self.notify(
            fid,
            "Mint confirmed!",
            &format!("Your FID MFER #{} is on-chain.", token_id),
        )
        .await;
    }
}
