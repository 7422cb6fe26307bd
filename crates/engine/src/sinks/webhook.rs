//! Webhook sink: POSTs snapshots to the UI push service.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::ChannelSink;

#[derive(Debug, Clone)]
pub struct WebhookSink {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        Ok(Self {
            name: "webhook".to_string(),
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl ChannelSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, target: &str, payload: &Value) -> Result<(), anyhow::Error> {
        let body = serde_json::json!({
            "channel": target,
            "payload": payload,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "push service returned {} for channel '{}'",
                response.status(),
                target
            ));
        }

        Ok(())
    }
}
