//! Core domain types

use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// A sentiment signal for one asset, produced by one source.
///
/// Ephemeral: replaced on every acquisition cycle. At most one signal per
/// ticker survives deduplication within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Asset ticker, without the leading sigil (e.g. "PEPE")
    pub ticker: String,
    /// Aggregate sentiment score, roughly in [-1, 1]
    pub score: f64,
    /// Source identifier (trust ledger key)
    pub source: String,
}

/// One candidate trade size in the fixed capital-utilization ladder.
///
/// Rebuilt every cycle from the freshly read balance. Amounts are exact
/// smallest-unit integers; no floating point ever touches them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridTier {
    pub label: String,
    /// Fraction of safe capital as a numerator over 100
    pub pct: u32,
    /// Leveraged beyond own balance; executed as a zero-upfront-value call
    pub flash: bool,
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Confirmed,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Confirmed => "confirmed",
            SettlementStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SettlementStatus::Pending),
            "confirmed" => Some(SettlementStatus::Confirmed),
            "failed" => Some(SettlementStatus::Failed),
            _ => None,
        }
    }
}

/// Result of one executed cycle, fed back into the trust ledger and persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub id: String,
    pub network: String,
    pub tier: String,
    pub tx_hash: Option<String>,
    pub status: SettlementStatus,
    /// Source whose trust is credited or penalized
    pub source: String,
    /// Trade amount in smallest units, decimal string
    pub amount: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionOutcome {
    pub fn new(
        network: &str,
        tier: &GridTier,
        tx_hash: Option<String>,
        status: SettlementStatus,
        source: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            network: network.to_string(),
            tier: tier.label.clone(),
            tx_hash,
            status,
            source: source.to_string(),
            amount: tier.amount.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-network worker phase, surfaced on the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Idle,
    AcquiringSignal,
    Planning,
    Probing,
    Selecting,
    Executing,
}

impl Default for WorkerPhase {
    fn default() -> Self {
        WorkerPhase::Idle
    }
}
