//! Multi-Chain Sentiment Grid Trading Bot
//!
//! Monitors several independent networks for trading opportunities, sizes
//! candidates on a fixed ladder of capital-utilization tiers, probes every
//! tier on-chain before committing capital, executes the best viable tier
//! through a private relay or a dual-channel public broadcast, and feeds the
//! outcome back into a per-source trust ledger.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator → N×ChainWorker (parallel, fault-isolated)
//!                     │ per cycle
//!                     ▼
//!    SignalAcquisition → GridPlanner → SimulationProbe (fan-out)
//!                     → Selector → Executor → TrustLedger (feedback)
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod grid;
pub mod monitor;
pub mod probe;
pub mod signals;
pub mod storage;
pub mod strategy;
pub mod trust;
pub mod types;
pub mod worker;

#[cfg(test)]
mod config_tests;
