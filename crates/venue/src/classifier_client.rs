use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::error;

use common::models::Classification;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

/// The opaque alpha-message classification collaborator.
#[async_trait]
pub trait AlphaClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<Classification>;
}

pub struct HttpClassifierClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpClassifierClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent("agent_exec_bot/0.1.0")
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client."),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl AlphaClassifier for HttpClassifierClient {
    async fn classify(&self, text: &str) -> anyhow::Result<Classification> {
        let url = format!("{}/classify", self.base_url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ClassifyRequest { text })
            .send()
            .await
            .context("Failed to send classification request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            error!("Classification failed ({}): {}", status, error_text);
            anyhow::bail!("HTTP {}: {}", status, error_text);
        }

        let classification = resp
            .json::<Classification>()
            .await
            .context("Failed to parse classification response")?;
        Ok(classification)
    }
}
