//! Trade execution
//!
//! Two mutually exclusive submission paths, chosen per network capability:
//! a private-relay bundle path (simulate against the next block, submit only
//! on a clean simulation, silently drop otherwise) and a dual-channel public
//! path (sign once, broadcast through the provider, duplicate the same raw
//! payload over a second channel best-effort, then await settlement).
//! Submissions from the same signing key are serialized behind a per-wallet
//! lock so overlapping triggers cannot race each other within the process.

use crate::chain::ChainClient;
use crate::error::{BotError, Result};
use crate::types::{ExecutionOutcome, GridTier, SettlementStatus};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Relay submission seam. [`RelayClient`] is the live implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BundleRelay: Send + Sync {
    /// Dry-run the single-tx bundle against the target block. Any error is
    /// a rejection.
    async fn simulate(&self, raw: &Bytes, target_block: u64) -> Result<()>;

    async fn submit(&self, raw: &Bytes, target_block: u64) -> Result<()>;
}

pub struct Executor {
    network: String,
    client: Arc<dyn ChainClient>,
    relay: Option<Arc<dyn BundleRelay>>,
    /// Shared across every worker signing with the same key
    wallet_lock: Arc<Mutex<()>>,
}

impl Executor {
    pub fn new(
        network: &str,
        client: Arc<dyn ChainClient>,
        relay: Option<Arc<dyn BundleRelay>>,
        wallet_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            network: network.to_string(),
            client,
            relay,
            wallet_lock,
        }
    }

    /// Submit the chosen tier. Returns None when the relay simulation
    /// rejects the bundle (dropped without broadcast, no trust penalty);
    /// otherwise the settled outcome. At most one broadcast per call.
    pub async fn execute(
        &self,
        tier: &GridTier,
        path: Vec<Address>,
        source: &str,
    ) -> Result<Option<ExecutionOutcome>> {
        let fees = self.client.fee_data().await?;

        let wallet = self.wallet_lock.lock().await;
        let raw = self.client.sign_swap(tier, path, &fees).await?;

        if let Some(relay) = &self.relay {
            return self.execute_bundle(relay.as_ref(), tier, raw, source).await;
        }

        let hash = self.client.broadcast_raw(raw.clone()).await?;
        tracing::info!(
            "Broadcast on {}: {} amount={} tx={:#x}",
            self.network,
            tier.label,
            tier.amount,
            hash
        );

        // Redundant delivery; the network dedupes by hash, this channel's
        // own outcome is not tracked.
        if let Err(e) = self.client.resend_raw(raw).await {
            tracing::debug!("Redundant channel error (ignored): {}", e);
        }

        // Both channels hold the payload now; other signers must not queue
        // behind the settlement wait.
        drop(wallet);

        let status = match self.client.await_confirmation(hash).await {
            Ok(true) => SettlementStatus::Confirmed,
            Ok(false) => SettlementStatus::Failed,
            Err(e) => {
                tracing::warn!("Confirmation wait failed for {:#x}: {}", hash, e);
                SettlementStatus::Failed
            }
        };

        Ok(Some(ExecutionOutcome::new(
            &self.network,
            tier,
            Some(format!("{:#x}", hash)),
            status,
            source,
        )))
    }

    async fn execute_bundle(
        &self,
        relay: &dyn BundleRelay,
        tier: &GridTier,
        raw: Bytes,
        source: &str,
    ) -> Result<Option<ExecutionOutcome>> {
        let target_block = self.client.next_block().await?;

        if let Err(e) = relay.simulate(&raw, target_block).await {
            // Rejection means no broadcast and no penalty
            tracing::debug!("Bundle simulation rejected on {}: {}", self.network, e);
            return Ok(None);
        }

        relay.submit(&raw, target_block).await?;
        let hash = format!("{:#x}", ethers::types::H256::from(ethers::utils::keccak256(&raw)));
        tracing::info!(
            "Bundle submitted on {} for block {}: {} ({})",
            self.network,
            target_block,
            tier.label,
            hash
        );

        Ok(Some(ExecutionOutcome::new(
            &self.network,
            tier,
            Some(hash),
            SettlementStatus::Pending,
            source,
        )))
    }
}

/// Private relay over signed JSON-RPC. Construction succeeding is what
/// "relay session established" means for this protocol; there is no
/// separate handshake.
pub struct RelayClient {
    url: String,
    http: reqwest::Client,
    signer: LocalWallet,
}

impl RelayClient {
    pub fn new(url: &str, signer: LocalWallet) -> Self {
        Self {
            url: url.to_string(),
            http: reqwest::Client::new(),
            signer,
        }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let payload = serde_json::to_string(&body)?;

        // Relay request authentication: sign the keccak of the payload
        let digest = format!("0x{}", hex::encode(ethers::utils::keccak256(payload.as_bytes())));
        let signature = self
            .signer
            .sign_message(digest)
            .await
            .map_err(|e| BotError::Signing(e.to_string()))?;
        let header = format!(
            "0x{}:0x{}",
            hex::encode(self.signer.address().as_bytes()),
            signature
        );

        let response: serde_json::Value = self
            .http
            .post(&self.url)
            .header("X-Flashbots-Signature", header)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.get("error") {
            return Err(BotError::Execution(format!("relay error: {}", err)));
        }
        Ok(response.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl BundleRelay for RelayClient {
    /// Any reported error or top-of-bundle revert is a rejection.
    async fn simulate(&self, raw: &Bytes, target_block: u64) -> Result<()> {
        let result = self
            .call(
                "eth_callBundle",
                serde_json::json!([{
                    "txs": [format!("0x{}", hex::encode(raw))],
                    "blockNumber": format!("{:#x}", target_block),
                    "stateBlockNumber": "latest",
                }]),
            )
            .await?;

        if let Some(results) = result.get("results").and_then(|r| r.as_array()) {
            for tx_result in results {
                if let Some(err) = tx_result.get("error") {
                    let revert = tx_result
                        .get("revert")
                        .and_then(|r| r.as_str())
                        .unwrap_or("");
                    return Err(BotError::Simulation(format!("{} {}", err, revert)));
                }
            }
        }
        Ok(())
    }

    async fn submit(&self, raw: &Bytes, target_block: u64) -> Result<()> {
        self.call(
            "eth_sendBundle",
            serde_json::json!([{
                "txs": [format!("0x{}", hex::encode(raw))],
                "blockNumber": format!("{:#x}", target_block),
            }]),
        )
        .await?;
        Ok(())
    }
}
