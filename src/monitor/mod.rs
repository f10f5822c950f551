//! Health endpoint and shared status snapshot
//!
//! Each worker publishes its phase, latest signals, and cycle counters here;
//! `GET /` serves the aggregate as JSON. No other routes, no authentication.

use crate::types::{SettlementStatus, Signal, WorkerPhase};
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Default)]
pub struct ChainStatus {
    pub chain: String,
    pub phase: WorkerPhase,
    pub signals: Vec<Signal>,
    pub cycles: u64,
    pub executed: u64,
    pub last_outcome: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

pub struct MonitorState {
    chains: RwLock<HashMap<String, ChainStatus>>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_phase(&self, chain: &str, phase: WorkerPhase) {
        let mut chains = self.chains.write().await;
        let entry = chains.entry(chain.to_string()).or_insert_with(|| ChainStatus {
            chain: chain.to_string(),
            ..ChainStatus::default()
        });
        entry.phase = phase;
        if phase == WorkerPhase::AcquiringSignal {
            entry.cycles += 1;
            entry.last_cycle_at = Some(Utc::now());
        }
    }

    pub async fn set_signals(&self, chain: &str, signals: Vec<Signal>) {
        let mut chains = self.chains.write().await;
        if let Some(entry) = chains.get_mut(chain) {
            entry.signals = signals;
        }
    }

    pub async fn record_outcome(&self, chain: &str, status: SettlementStatus) {
        let mut chains = self.chains.write().await;
        if let Some(entry) = chains.get_mut(chain) {
            entry.executed += 1;
            entry.last_outcome = Some(status.as_str().to_string());
        }
    }

    pub async fn snapshot(&self) -> Vec<ChainStatus> {
        let chains = self.chains.read().await;
        let mut statuses: Vec<ChainStatus> = chains.values().cloned().collect();
        statuses.sort_by(|a, b| a.chain.cmp(&b.chain));
        statuses
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_router(state: Arc<MonitorState>) -> Router {
    Router::new().route("/", get(health)).with_state(state)
}

async fn health(State(state): State<Arc<MonitorState>>) -> Json<serde_json::Value> {
    let chains = state.snapshot().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "chains": chains,
    }))
}

/// Bind and serve the health endpoint until the process exits.
pub async fn start_monitor(state: Arc<MonitorState>, port: u16) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| crate::error::BotError::Config(format!("bind port {}: {}", port, e)))?;
    tracing::info!("Health endpoint listening on :{}", port);
    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| crate::error::BotError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_phase_updates_count_cycles() {
        let state = MonitorState::new();
        state.set_phase("base", WorkerPhase::AcquiringSignal).await;
        state.set_phase("base", WorkerPhase::Planning).await;
        state.set_phase("base", WorkerPhase::Idle).await;
        state.set_phase("base", WorkerPhase::AcquiringSignal).await;

        let snap = state.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].cycles, 2);
        assert_eq!(snap[0].phase, WorkerPhase::AcquiringSignal);
    }

    #[tokio::test]
    async fn test_outcomes_and_signals_surface() {
        let state = MonitorState::new();
        state.set_phase("base", WorkerPhase::AcquiringSignal).await;
        state
            .set_signals(
                "base",
                vec![Signal {
                    ticker: "PEPE".into(),
                    score: 0.6,
                    source: "feed-a".into(),
                }],
            )
            .await;
        state.record_outcome("base", SettlementStatus::Confirmed).await;

        let snap = state.snapshot().await;
        assert_eq!(snap[0].signals.len(), 1);
        assert_eq!(snap[0].executed, 1);
        assert_eq!(snap[0].last_outcome.as_deref(), Some("confirmed"));
    }
}
