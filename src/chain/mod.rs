//! Chain access layer
//!
//! Wraps the JSON-RPC transport behind a small capability trait: balance,
//! fee data, dry-run estimation, raw broadcast, confirmation, and the
//! pending-transaction subscription used by reactive workers.

use crate::config::{parse_address, NetworkProfile, WalletConfig};
use crate::error::{BotError, Result};
use crate::types::GridTier;
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::providers::{Http, Middleware, Provider, Ws};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes,
    Eip1559TransactionRequest, TxHash, U256,
};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const CONFIRMATION_POLL_SECS: u64 = 3;
const CONFIRMATION_POLL_LIMIT: u32 = 60;
const GWEI: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy)]
pub struct FeeEstimate {
    pub max_fee: U256,
    pub priority_fee: U256,
}

/// On-chain capabilities a worker consumes. Mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn address(&self) -> Address;

    /// Current native balance of the signing wallet
    async fn balance(&self) -> Result<U256>;

    async fn fee_data(&self) -> Result<FeeEstimate>;

    /// Dry-run one tier against the executor contract. Success is the
    /// viability signal; a revert or estimation error marks the tier
    /// non-viable.
    async fn probe_swap(&self, amount: U256, path: Vec<Address>, flash: bool) -> Result<()>;

    /// Sign the trade once; the same payload feeds every delivery channel.
    async fn sign_swap(&self, tier: &GridTier, path: Vec<Address>, fees: &FeeEstimate)
        -> Result<Bytes>;

    /// Primary broadcast channel
    async fn broadcast_raw(&self, raw: Bytes) -> Result<TxHash>;

    /// Redundant lower-level raw channel; the network dedupes by tx hash so
    /// duplicate submission is safe. Callers swallow this channel's errors.
    async fn resend_raw(&self, raw: Bytes) -> Result<()>;

    /// Poll for the receipt. Ok(true) = confirmed, Ok(false) = reverted.
    async fn await_confirmation(&self, hash: TxHash) -> Result<bool>;

    /// Height the next block is expected at (bundle target)
    async fn next_block(&self) -> Result<u64>;
}

/// EVM implementation over ethers
pub struct EvmClient {
    provider: Provider<Http>,
    /// Second RPC endpoint (falls back to the primary) used as the
    /// redundant raw broadcast channel
    resend_url: String,
    http: reqwest::Client,
    wallet: LocalWallet,
    executor: Address,
    priority_fee_hint: Option<U256>,
}

impl EvmClient {
    pub fn new(profile: &NetworkProfile, wallet_cfg: &WalletConfig) -> Result<Self> {
        let rpc_url = profile
            .rpc_urls
            .first()
            .ok_or_else(|| BotError::Config(format!("network {}: no rpc url", profile.name)))?;
        let provider = Provider::<Http>::try_from(rpc_url.as_str())
            .map_err(|e| BotError::Config(format!("bad rpc url {}: {}", rpc_url, e)))?;

        let wallet = wallet_cfg
            .private_key
            .parse::<LocalWallet>()
            .map_err(|e| BotError::Signing(format!("bad private key: {}", e)))?
            .with_chain_id(profile.chain_id);

        let resend_url = profile
            .rpc_urls
            .get(1)
            .unwrap_or(rpc_url)
            .clone();

        Ok(Self {
            provider,
            resend_url,
            http: reqwest::Client::new(),
            wallet,
            executor: parse_address(&wallet_cfg.executor)?,
            priority_fee_hint: profile.priority_fee_gwei.map(|g| U256::from(g) * GWEI),
        })
    }

    pub fn signer(&self) -> LocalWallet {
        self.wallet.clone()
    }

    /// Calldata for the executor contract. Flash tiers borrow inside the
    /// call and carry no upfront value.
    fn swap_calldata(amount: U256, path: &[Address], flash: bool) -> Bytes {
        let signature = if flash {
            "executeFlash(uint256,address[])"
        } else {
            "executeSwing(uint256,address[])"
        };
        let selector = ethers::utils::id(signature);
        let encoded = ethers::abi::encode(&[
            Token::Uint(amount),
            Token::Array(path.iter().map(|a| Token::Address(*a)).collect()),
        ]);
        let mut data = selector.to_vec();
        data.extend_from_slice(&encoded);
        data.into()
    }

    fn swap_request(&self, amount: U256, path: &[Address], flash: bool) -> Eip1559TransactionRequest {
        let value = if flash { U256::zero() } else { amount };
        Eip1559TransactionRequest::new()
            .from(self.wallet.address())
            .to(self.executor)
            .value(value)
            .data(Self::swap_calldata(amount, path, flash))
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn balance(&self) -> Result<U256> {
        self.provider
            .get_balance(self.wallet.address(), None)
            .await
            .map_err(|e| BotError::Chain(e.to_string()))
    }

    async fn fee_data(&self) -> Result<FeeEstimate> {
        let (max_fee, mut priority_fee) = self
            .provider
            .estimate_eip1559_fees(None)
            .await
            .map_err(|e| BotError::Chain(e.to_string()))?;
        if let Some(hint) = self.priority_fee_hint {
            priority_fee = hint;
        }
        Ok(FeeEstimate { max_fee, priority_fee })
    }

    async fn probe_swap(&self, amount: U256, path: Vec<Address>, flash: bool) -> Result<()> {
        let tx: TypedTransaction = self.swap_request(amount, &path, flash).into();
        self.provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| BotError::Simulation(e.to_string()))?;
        Ok(())
    }

    async fn sign_swap(
        &self,
        tier: &GridTier,
        path: Vec<Address>,
        fees: &FeeEstimate,
    ) -> Result<Bytes> {
        let nonce = self
            .provider
            .get_transaction_count(self.wallet.address(), Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| BotError::Chain(e.to_string()))?;

        let mut request = self
            .swap_request(tier.amount, &path, tier.flash)
            .nonce(nonce)
            .chain_id(self.wallet.chain_id())
            .max_fee_per_gas(fees.max_fee)
            .max_priority_fee_per_gas(fees.priority_fee);

        let unsigned: TypedTransaction = request.clone().into();
        let gas = self
            .provider
            .estimate_gas(&unsigned, None)
            .await
            .map_err(|e| BotError::Simulation(e.to_string()))?;
        // 20% headroom over the estimate
        request = request.gas(gas * 120u64 / 100u64);

        let typed: TypedTransaction = request.into();
        let signature = self
            .wallet
            .sign_transaction(&typed)
            .await
            .map_err(|e| BotError::Signing(e.to_string()))?;
        Ok(typed.rlp_signed(&signature))
    }

    async fn broadcast_raw(&self, raw: Bytes) -> Result<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| BotError::Execution(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn resend_raw(&self, raw: Bytes) -> Result<()> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendRawTransaction",
            "params": [format!("0x{}", hex::encode(&raw))],
        });
        let response: serde_json::Value = self
            .http
            .post(&self.resend_url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if let Some(err) = response.get("error") {
            return Err(BotError::Chain(err.to_string()));
        }
        Ok(())
    }

    async fn await_confirmation(&self, hash: TxHash) -> Result<bool> {
        for _ in 0..CONFIRMATION_POLL_LIMIT {
            tokio::time::sleep(Duration::from_secs(CONFIRMATION_POLL_SECS)).await;
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| BotError::Chain(e.to_string()))?;
            if let Some(receipt) = receipt {
                return Ok(receipt.status == Some(1u64.into()));
            }
        }
        Err(BotError::Execution(format!("confirmation timed out for {:#x}", hash)))
    }

    async fn next_block(&self) -> Result<u64> {
        let current = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| BotError::Chain(e.to_string()))?;
        Ok(current.as_u64() + 1)
    }
}

/// Pump pending-transaction hashes into `tx` until the stream closes or the
/// stop signal fires. Returns Ok on a clean close so the caller's reconnect
/// loop decides what happens next; the trigger send is best-effort and
/// collapses while a cycle is running.
pub async fn stream_pending_txs(
    ws_url: &str,
    tx: mpsc::Sender<TxHash>,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    let ws = Provider::<Ws>::connect(ws_url)
        .await
        .map_err(|e| BotError::Chain(e.to_string()))?;
    let mut stream = ws
        .subscribe_pending_txs()
        .await
        .map_err(|e| BotError::Chain(e.to_string()))?;

    loop {
        tokio::select! {
            _ = stop.changed() => {
                if *stop.borrow() {
                    return Ok(());
                }
            }
            item = stream.next() => match item {
                Some(hash) => {
                    let _ = tx.try_send(hash);
                }
                None => return Ok(()),
            }
        }
    }
}
