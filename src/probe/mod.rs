//! Concurrent viability probing
//!
//! Dry-runs every tier of the ladder against the executor contract at once
//! (bounded fan-out of seven probes) and collects the full result set before
//! anything proceeds. A failing probe only marks its own tier non-viable;
//! siblings are neither cancelled nor tainted. Probe acceptance is the sole
//! viability signal here; it is a heuristic, not a profit estimate.

use crate::chain::ChainClient;
use crate::types::GridTier;
use ethers::types::Address;
use futures_util::future::join_all;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub tier: GridTier,
    pub viable: bool,
}

pub struct SimulationProbe {
    client: Arc<dyn ChainClient>,
}

impl SimulationProbe {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Probe every tier concurrently and fan the results back in, preserving
    /// ladder order regardless of completion order.
    pub async fn run(&self, tiers: Vec<GridTier>, path: Vec<Address>) -> Vec<ProbeOutcome> {
        let probes = tiers.into_iter().map(|tier| {
            let client = self.client.clone();
            let path = path.clone();
            async move {
                let viable = match client.probe_swap(tier.amount, path, tier.flash).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!("Tier {} not viable: {}", tier.label, e);
                        false
                    }
                };
                ProbeOutcome { tier, viable }
            }
        });
        join_all(probes).await
    }
}
