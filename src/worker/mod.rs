//! Per-network workers and supervision
//!
//! One ChainWorker per configured network, each in its own task so a crash
//! never affects a sibling. The Orchestrator keeps an explicit supervision
//! table (network -> handle) and restarts a dead worker with bounded backoff,
//! preserving the network profile across restarts. Workers shut down
//! cooperatively through a watch-channel stop signal.

use crate::chain::{self, ChainClient, EvmClient};
use crate::config::{Config, NetworkProfile, SignalSourceConfig, StrategyConfig, Trigger};
use crate::error::{BotError, Result};
use crate::executor::{BundleRelay, Executor, RelayClient};
use crate::grid::GridPlanner;
use crate::monitor::MonitorState;
use crate::probe::SimulationProbe;
use crate::signals::SignalAcquisition;
use crate::storage::Database;
use crate::strategy::select_tier;
use crate::trust::TrustLedger;
use crate::types::{SettlementStatus, Signal, WorkerPhase};
use ethers::types::{Address, TxHash, U256};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

const RESTART_BASE_SECS: u64 = 5;
const RESTART_CAP_SECS: u64 = 60;
/// A worker that survived this long gets its backoff reset
const STABLE_UPTIME_SECS: u64 = 300;

/// Source identifier credited when no real source produced a signal
const DISCOVERY_SOURCE: &str = "discovery";

/// State machine per network:
/// IDLE -> ACQUIRING_SIGNAL -> PLANNING -> PROBING -> SELECTING -> EXECUTING -> IDLE
pub struct ChainWorker {
    profile: NetworkProfile,
    strategy: StrategyConfig,
    sources: Vec<SignalSourceConfig>,
    reserve: U256,
    moat: U256,
    base: Address,
    client: Arc<dyn ChainClient>,
    signals: SignalAcquisition,
    planner: GridPlanner,
    probe: SimulationProbe,
    executor: Executor,
    trust: Arc<TrustLedger>,
    storage: Option<Arc<Database>>,
    monitor: Arc<MonitorState>,
    dry_run: bool,
}

impl ChainWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profile: NetworkProfile,
        strategy: StrategyConfig,
        sources: Vec<SignalSourceConfig>,
        reserve: U256,
        client: Arc<dyn ChainClient>,
        relay: Option<Arc<dyn BundleRelay>>,
        trust: Arc<TrustLedger>,
        storage: Option<Arc<Database>>,
        monitor: Arc<MonitorState>,
        wallet_lock: Arc<Mutex<()>>,
        dry_run: bool,
    ) -> Result<Self> {
        let moat = profile.moat()?;
        let base = profile.base_asset_address()?;
        let signals = SignalAcquisition::new(
            sources.clone(),
            strategy.sentiment_threshold,
            strategy.fetch_timeout_ms,
        );
        let planner = GridPlanner::new(reserve);
        let probe = SimulationProbe::new(client.clone());
        let executor = Executor::new(&profile.name, client.clone(), relay, wallet_lock);
        Ok(Self {
            profile,
            strategy,
            sources,
            reserve,
            moat,
            base,
            client,
            signals,
            planner,
            probe,
            executor,
            trust,
            storage,
            monitor,
            dry_run,
        })
    }

    pub async fn run(&self, stop: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            "Worker started for {} (chain {}, {:?} trigger)",
            self.profile.name,
            self.profile.chain_id,
            self.profile.trigger
        );
        match self.profile.trigger {
            Trigger::Interval => self.run_interval(stop).await,
            Trigger::Reactive => self.run_reactive(stop).await,
        }
    }

    async fn run_interval(&self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.strategy.interval_secs));
        loop {
            tokio::select! {
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    // Interval-triggered cycles acquire signals inline and
                    // carry no execution overhead deduction
                    self.cycle(None, U256::zero()).await;
                }
            }
        }
    }

    async fn run_reactive(&self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let ws_url = self.profile.ws_url.clone().ok_or_else(|| {
            BotError::Config(format!("network {}: reactive trigger without ws_url", self.profile.name))
        })?;

        // Background task refreshing an immutable signal snapshot; the
        // reactive handler always reads one coherent generation through the
        // watch channel.
        let (snap_tx, snap_rx) = watch::channel::<Arc<Vec<Signal>>>(Arc::new(Vec::new()));
        {
            let acquisition = SignalAcquisition::new(
                self.sources.clone(),
                self.strategy.sentiment_threshold,
                self.strategy.fetch_timeout_ms,
            );
            let refresh = Duration::from_secs(self.strategy.signal_refresh_secs);
            let mut stop_rx = stop.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(refresh);
                loop {
                    tokio::select! {
                        _ = stop_rx.changed() => {
                            if *stop_rx.borrow() {
                                return;
                            }
                        }
                        _ = ticker.tick() => {
                            let signals = acquisition.acquire().await;
                            if snap_tx.send(Arc::new(signals)).is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }

        loop {
            if *stop.borrow() {
                return Ok(());
            }

            // Capacity 1: pending-tx notifications collapse while a cycle runs
            let (trigger_tx, mut trigger_rx) = mpsc::channel::<TxHash>(1);
            let pump = {
                let url = ws_url.clone();
                let stop_rx = stop.clone();
                tokio::spawn(async move { chain::stream_pending_txs(&url, trigger_tx, stop_rx).await })
            };

            loop {
                tokio::select! {
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            pump.abort();
                            return Ok(());
                        }
                    }
                    trigger = trigger_rx.recv() => match trigger {
                        Some(_) => {
                            let snapshot = snap_rx.borrow().clone();
                            self.cycle(Some(snapshot), self.moat).await;
                        }
                        None => break,
                    }
                }
            }

            match pump.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if e.is_noise() {
                        tracing::debug!("Stream error on {}: {}", self.profile.name, e);
                    } else {
                        tracing::warn!("Stream error on {}: {}", self.profile.name, e);
                    }
                }
                Err(e) => tracing::error!("Stream task failed on {}: {}", self.profile.name, e),
            }

            // Fixed delay, infinite retries
            tracing::info!(
                "Reconnecting {} stream in {}s",
                self.profile.name,
                self.strategy.reconnect_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(self.strategy.reconnect_delay_secs)).await;
        }
    }

    /// One full cycle. Errors are contained here: noise is demoted to debug,
    /// the rest logged, and the worker returns to IDLE either way.
    async fn cycle(&self, snapshot: Option<Arc<Vec<Signal>>>, overhead: U256) {
        if let Err(e) = self.try_cycle(snapshot, overhead).await {
            if e.is_noise() {
                tracing::debug!("Cycle on {} skipped: {}", self.profile.name, e);
            } else {
                tracing::error!("Cycle on {} failed: {}", self.profile.name, e);
            }
        }
        self.monitor.set_phase(&self.profile.name, WorkerPhase::Idle).await;
    }

    async fn try_cycle(&self, snapshot: Option<Arc<Vec<Signal>>>, overhead: U256) -> Result<()> {
        let name = self.profile.name.as_str();
        self.monitor.set_phase(name, WorkerPhase::AcquiringSignal).await;

        // Balance is read fresh on every trigger, never cached
        let balance = self.client.balance().await?;
        if balance < self.reserve {
            tracing::debug!("{}: balance {} below reserve, skipping cycle", name, balance);
            return Ok(());
        }

        let signals = match snapshot {
            Some(snap) => (*snap).clone(),
            None => self.signals.acquire().await,
        };
        self.monitor.set_signals(name, signals.clone()).await;

        let (ticker, source) = match signals.first() {
            Some(signal) => {
                tracing::info!(
                    "{}: signal ${} from {} (score {:.2}, trust {:.2})",
                    name,
                    signal.ticker,
                    signal.source,
                    signal.score,
                    self.trust.get(&signal.source)
                );
                (signal.ticker.clone(), signal.source.clone())
            }
            None => {
                tracing::info!("{}: no signals, discovery mode on ${}", name, self.strategy.default_ticker);
                (self.strategy.default_ticker.clone(), DISCOVERY_SOURCE.to_string())
            }
        };

        let Some(token) = self.profile.token_address(&ticker) else {
            tracing::debug!("{}: no token mapping for ${}, skipping", name, ticker);
            return Ok(());
        };
        let path = vec![self.base, token, self.base];

        self.monitor.set_phase(name, WorkerPhase::Planning).await;
        let tiers = self.planner.plan(balance, overhead);
        if tiers.is_empty() {
            tracing::debug!("{}: no safe capital after reserve and overhead", name);
            return Ok(());
        }

        self.monitor.set_phase(name, WorkerPhase::Probing).await;
        let outcomes = self.probe.run(tiers, path.clone()).await;

        self.monitor.set_phase(name, WorkerPhase::Selecting).await;
        let Some(tier) = select_tier(&outcomes) else {
            tracing::info!("{}: no viable tier for ${}", name, ticker);
            return Ok(());
        };

        self.monitor.set_phase(name, WorkerPhase::Executing).await;
        tracing::info!("{}: executing {} amount={} for ${}", name, tier.label, tier.amount, ticker);

        if self.dry_run {
            tracing::info!("{}: DRY RUN, not broadcasting {}", name, tier.label);
            return Ok(());
        }

        match self.executor.execute(&tier, path, &source).await {
            Ok(Some(outcome)) => {
                let success = outcome.status != SettlementStatus::Failed;
                let weight = self.trust.update(&source, success);
                tracing::info!(
                    "{}: {} settled {} (trust[{}] -> {:.2})",
                    name,
                    tier.label,
                    outcome.status.as_str(),
                    source,
                    weight
                );
                self.monitor.record_outcome(name, outcome.status).await;
                if let Some(db) = &self.storage {
                    if let Err(e) = db.save_outcome(&outcome).await {
                        tracing::warn!("Failed to record outcome: {}", e);
                    }
                }
            }
            Ok(None) => {
                // Bundle simulation rejected: dropped without broadcast,
                // no trust update
                tracing::debug!("{}: bundle dropped in simulation", name);
            }
            Err(e) => {
                self.trust.update(&source, false);
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Starts one supervised worker per configured network.
pub struct Orchestrator {
    config: Arc<Config>,
    trust: Arc<TrustLedger>,
    storage: Option<Arc<Database>>,
    monitor: Arc<MonitorState>,
    dry_run: bool,
    wallet_lock: Arc<Mutex<()>>,
    stop_tx: watch::Sender<bool>,
    /// Supervision table: network name -> supervisor handle
    table: HashMap<String, JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        trust: Arc<TrustLedger>,
        storage: Option<Arc<Database>>,
        monitor: Arc<MonitorState>,
        dry_run: bool,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            trust,
            storage,
            monitor,
            dry_run,
            wallet_lock: Arc::new(Mutex::new(())),
            stop_tx,
            table: HashMap::new(),
        }
    }

    pub fn start(&mut self) {
        for profile in self.config.networks.clone() {
            let name = profile.name.clone();
            let ctx = SupervisorCtx {
                profile,
                config: self.config.clone(),
                trust: self.trust.clone(),
                storage: self.storage.clone(),
                monitor: self.monitor.clone(),
                wallet_lock: self.wallet_lock.clone(),
                dry_run: self.dry_run,
            };
            let stop_rx = self.stop_tx.subscribe();
            let handle = tokio::spawn(supervise(ctx, stop_rx));
            self.table.insert(name, handle);
        }
        tracing::info!("Orchestrator started {} network workers", self.table.len());
    }

    /// Signal every worker to stop and wait for the table to drain.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);
        for (name, handle) in self.table.drain() {
            if let Err(e) = handle.await {
                tracing::warn!("Supervisor for {} ended abnormally: {}", name, e);
            }
        }
        tracing::info!("All workers stopped");
    }
}

struct SupervisorCtx {
    profile: NetworkProfile,
    config: Arc<Config>,
    trust: Arc<TrustLedger>,
    storage: Option<Arc<Database>>,
    monitor: Arc<MonitorState>,
    wallet_lock: Arc<Mutex<()>>,
    dry_run: bool,
}

fn build_worker(ctx: &SupervisorCtx) -> Result<ChainWorker> {
    let client = Arc::new(EvmClient::new(&ctx.profile, &ctx.config.wallet)?);
    let relay = if ctx.profile.relay {
        ctx.profile
            .relay_url
            .as_deref()
            .map(|url| Arc::new(RelayClient::new(url, client.signer())) as Arc<dyn BundleRelay>)
    } else {
        None
    };
    ChainWorker::new(
        ctx.profile.clone(),
        ctx.config.strategy.clone(),
        ctx.config.signals.sources.clone(),
        ctx.config.min_reserve()?,
        client,
        relay,
        ctx.trust.clone(),
        ctx.storage.clone(),
        ctx.monitor.clone(),
        ctx.wallet_lock.clone(),
        ctx.dry_run,
    )
}

/// Isolated fault domain for one network: run the worker in its own task,
/// restart it on failure with bounded backoff, keep the profile across
/// incarnations.
async fn supervise(ctx: SupervisorCtx, mut stop: watch::Receiver<bool>) {
    let name = ctx.profile.name.clone();
    let mut backoff = Duration::from_secs(RESTART_BASE_SECS);

    loop {
        if *stop.borrow() {
            return;
        }
        let started = Instant::now();

        match build_worker(&ctx) {
            Ok(worker) => {
                let stop_rx = stop.clone();
                let handle = tokio::spawn(async move { worker.run(stop_rx).await });
                match handle.await {
                    Ok(Ok(())) => {
                        tracing::info!("Worker {} stopped cleanly", name);
                        return;
                    }
                    Ok(Err(e)) => tracing::error!("Worker {} failed: {}", name, e),
                    Err(e) => tracing::error!("Worker {} crashed: {}", name, e),
                }
            }
            Err(e) => tracing::error!("Worker {} failed to initialize: {}", name, e),
        }

        if started.elapsed() >= Duration::from_secs(STABLE_UPTIME_SECS) {
            backoff = Duration::from_secs(RESTART_BASE_SECS);
        }
        let delay = jitter(backoff);
        tracing::warn!("Restarting worker {} in {:.1}s", name, delay.as_secs_f64());
        tokio::select! {
            _ = stop.changed() => {
                if *stop.borrow() {
                    return;
                }
            }
            _ = tokio::time::sleep(delay) => {}
        }
        backoff = (backoff * 2).min(Duration::from_secs(RESTART_CAP_SECS));
    }
}

fn jitter(base: Duration) -> Duration {
    base.mul_f64(rand::rng().random_range(0.8..1.2))
}
