use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use common::models::{Deployment, Signal};

#[derive(Debug, Serialize)]
struct TradeRequest<'a> {
    signal_id: &'a str,
    deployment_id: &'a str,
    wallet_address: &'a str,
    token: &'a str,
    side: &'a str,
    venue: &'a str,
    allocation_pct: f64,
    leverage: f64,
}

/// Result contract of the opaque venue-trade-execution collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeResult {
    pub success: bool,
    pub entry_price: Option<f64>,
    pub collateral: Option<f64>,
    pub tx_hash: Option<String>,
    pub trade_id: Option<String>,
    pub error: Option<String>,
}

/// The venue trade-submission client. Opaque to the pipeline: the only
/// thing the executor depends on is the `TradeResult` contract.
#[async_trait]
pub trait VenueClient: Send + Sync {
    async fn execute_trade(
        &self,
        signal: &Signal,
        deployment: &Deployment,
    ) -> anyhow::Result<TradeResult>;
}

pub struct HttpVenueClient {
    client: Client,
    base_url: String,
}

impl HttpVenueClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent("agent_exec_bot/0.1.0")
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client."),
            base_url,
        }
    }
}

#[async_trait]
impl VenueClient for HttpVenueClient {
    async fn execute_trade(
        &self,
        signal: &Signal,
        deployment: &Deployment,
    ) -> anyhow::Result<TradeResult> {
        let url = format!("{}/trades", self.base_url);
        let body = TradeRequest {
            signal_id: &signal.id,
            deployment_id: &deployment.id,
            wallet_address: &deployment.wallet_address,
            token: &signal.token,
            side: &signal.side,
            venue: &signal.venue,
            allocation_pct: signal.allocation_pct,
            leverage: signal.leverage,
        };

        info!(
            "Submitting trade: {} {} ({}% @ {}x)",
            signal.side, signal.token, signal.allocation_pct, signal.leverage
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send trade request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            error!("Venue trade submission failed ({}): {}", status, error_text);
            anyhow::bail!("HTTP {}: {}", status, error_text);
        }

        let result = resp
            .json::<TradeResult>()
            .await
            .context("Failed to parse trade response")?;
        Ok(result)
    }
}
