//! Signal acquisition
//!
//! Fetches text from each configured source with a bounded timeout, scores
//! sentiment with a lexicon, extracts the first `$TICKER` token, and
//! deduplicates by ticker (first occurrence wins). A failing source is
//! skipped for the cycle; it never aborts the others.

use crate::config::SignalSourceConfig;
use crate::error::Result;
use crate::types::Signal;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

/// Currency sigil followed by uppercase letters
static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z]{2,10})\b").expect("valid ticker pattern"));

const BULLISH: &[&str] = &[
    "moon", "bullish", "pump", "pumping", "surge", "breakout", "rally", "ape",
    "send", "sending", "buy", "accumulate", "higher", "up", "gem", "explode",
];

const BEARISH: &[&str] = &[
    "dump", "dumping", "bearish", "rug", "rugged", "crash", "scam", "sell",
    "exit", "down", "lower", "dead", "rekt", "bleed",
];

pub struct SignalAcquisition {
    http: reqwest::Client,
    sources: Vec<SignalSourceConfig>,
    threshold: f64,
    timeout: Duration,
}

impl SignalAcquisition {
    pub fn new(sources: Vec<SignalSourceConfig>, threshold: f64, timeout_ms: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            sources,
            threshold,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// One acquisition cycle. Never fails; a possibly-empty, source-ordered
    /// and ticker-deduplicated list is returned.
    pub async fn acquire(&self) -> Vec<Signal> {
        let mut signals = Vec::new();
        for source in &self.sources {
            match self.fetch(&source.url).await {
                Ok(text) => {
                    if let Some(signal) = evaluate_source(&source.name, &text, self.threshold) {
                        signals.push(signal);
                    }
                }
                Err(e) => {
                    tracing::warn!("Source {} skipped: {}", source.name, e);
                }
            }
        }
        dedupe_by_ticker(signals)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let text = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .text()
            .await?;
        Ok(text)
    }
}

/// Score a source's text and extract its candidate signal, if any.
pub fn evaluate_source(name: &str, text: &str, threshold: f64) -> Option<Signal> {
    let score = sentiment_score(text);
    if score <= threshold {
        return None;
    }
    let ticker = extract_ticker(text)?;
    Some(Signal {
        ticker,
        score,
        source: name.to_string(),
    })
}

/// Lexicon sentiment in [-1, 1]: (bullish - bearish) / total hits.
pub fn sentiment_score(text: &str) -> f64 {
    let mut bullish = 0usize;
    let mut bearish = 0usize;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let lower = word.to_lowercase();
        if BULLISH.contains(&lower.as_str()) {
            bullish += 1;
        } else if BEARISH.contains(&lower.as_str()) {
            bearish += 1;
        }
    }
    let total = bullish + bearish;
    if total == 0 {
        return 0.0;
    }
    (bullish as f64 - bearish as f64) / total as f64
}

/// First ticker-shaped token in the text, without the sigil.
pub fn extract_ticker(text: &str) -> Option<String> {
    TICKER_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// First occurrence per ticker wins; order is otherwise preserved.
pub fn dedupe_by_ticker(signals: Vec<Signal>) -> Vec<Signal> {
    let mut seen = HashSet::new();
    signals
        .into_iter()
        .filter(|s| seen.insert(s.ticker.clone()))
        .collect()
}
