//! Realtime push — best-effort delivery to a hosted pub/sub provider.
//!
//! A push is a latency optimisation on top of the durable inbox. Callers are
//! expected to log failures and move on.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::types::PushPayload;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex>` of the request body.
pub const SIGNATURE_HEADER: &str = "x-campus-signature";

#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Fire `payload` at every live session of `user_id`.
    async fn push(&self, user_id: &str, payload: &PushPayload) -> Result<()>;
}

/// Per-user channel name on the realtime provider.
pub fn user_channel(user_id: &str) -> String {
    format!("user-{user_id}")
}

/// Pushes through a provider HTTP endpoint with an HMAC-signed JSON body.
pub struct HttpPush {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
}

impl HttpPush {
    pub fn new(endpoint: String, secret: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Push(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            secret,
        })
    }
}

#[async_trait]
impl PushChannel for HttpPush {
    async fn push(&self, user_id: &str, payload: &PushPayload) -> Result<()> {
        let channel = user_channel(user_id);
        let body = serde_json::to_vec(&json!({
            "channel": channel,
            "event": payload.event,
            "data": payload.data,
        }))?;
        let signature = sign_body(&self.secret, &body)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Push(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Push(format!("provider returned {status}: {text}")));
        }
        debug!(%channel, event = %payload.event, "realtime push accepted");
        Ok(())
    }
}

/// Stand-in used when no provider is configured. Every push fails so the
/// misconfiguration shows up in logs instead of silently vanishing.
pub struct UnconfiguredPush;

#[async_trait]
impl PushChannel for UnconfiguredPush {
    async fn push(&self, _user_id: &str, _payload: &PushPayload) -> Result<()> {
        Err(NotifyError::PushNotConfigured)
    }
}

/// `sha256=<hex>` HMAC of `body` keyed by `secret`.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| NotifyError::Push("invalid HMAC key length".to_string()))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_and_key_dependent() {
        let a = sign_body("k1", b"{}").unwrap();
        let b = sign_body("k1", b"{}").unwrap();
        let c = sign_body("k2", b"{}").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);
    }

    #[test]
    fn channel_is_per_user() {
        assert_eq!(user_channel("42"), "user-42");
    }

    #[tokio::test]
    async fn unconfigured_push_reports_misconfiguration() {
        let payload = PushPayload {
            event: "bus-arrival".into(),
            data: serde_json::Value::Null,
        };
        let err = UnconfiguredPush.push("u1", &payload).await.unwrap_err();
        assert!(matches!(err, NotifyError::PushNotConfigured));
    }
}
