//! Trade history persistence (sqlite)

use crate::error::Result;
use crate::types::{ExecutionOutcome, SettlementStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS outcomes (
    id TEXT PRIMARY KEY,
    network TEXT NOT NULL,
    tier TEXT NOT NULL,
    tx_hash TEXT,
    status TEXT NOT NULL,
    source TEXT NOT NULL,
    amount TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

#[derive(Debug, Clone, Default)]
pub struct DailyStats {
    pub trades: i64,
    pub confirmed: i64,
    pub failed: i64,
}

#[derive(Debug, Clone)]
pub struct OutcomeRow {
    pub id: String,
    pub network: String,
    pub tier: String,
    pub tx_hash: Option<String>,
    pub status: Option<SettlementStatus>,
    pub source: String,
    pub amount: String,
    pub created_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(path: &str) -> Result<Self> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", shellexpand::tilde(path))
        };
        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
        // Single connection: writes are serialized anyway, and an in-memory
        // database must not be split across pool connections
        let pool: SqlitePool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn save_outcome(&self, outcome: &ExecutionOutcome) -> Result<()> {
        sqlx::query(
            "INSERT INTO outcomes (id, network, tier, tx_hash, status, source, amount, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&outcome.id)
        .bind(&outcome.network)
        .bind(&outcome.tier)
        .bind(&outcome.tx_hash)
        .bind(outcome.status.as_str())
        .bind(&outcome.source)
        .bind(&outcome.amount)
        .bind(outcome.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_outcomes(&self, limit: i64) -> Result<Vec<OutcomeRow>> {
        let rows = sqlx::query(
            "SELECT id, network, tier, tx_hash, status, source, amount, created_at
             FROM outcomes ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| OutcomeRow {
                id: row.get("id"),
                network: row.get("network"),
                tier: row.get("tier"),
                tx_hash: row.get("tx_hash"),
                status: SettlementStatus::parse(row.get::<String, _>("status").as_str()),
                source: row.get("source"),
                amount: row.get("amount"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn daily_stats(&self) -> Result<DailyStats> {
        let midnight: DateTime<Utc> = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        let row = sqlx::query(
            "SELECT COUNT(*) AS trades,
                    COALESCE(SUM(status = 'confirmed'), 0) AS confirmed,
                    COALESCE(SUM(status = 'failed'), 0) AS failed
             FROM outcomes WHERE created_at >= ?",
        )
        .bind(midnight.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(DailyStats {
            trades: row.get("trades"),
            confirmed: row.get("confirmed"),
            failed: row.get("failed"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridTier;
    use ethers::types::U256;

    fn outcome(status: SettlementStatus) -> ExecutionOutcome {
        let tier = GridTier {
            label: "MAX (100%)".to_string(),
            pct: 100,
            flash: false,
            amount: U256::from(998_000_000u64),
        };
        ExecutionOutcome::new("testnet", &tier, Some("0xabc".into()), status, "feed-a")
    }

    #[tokio::test]
    async fn test_save_and_read_back() {
        let db = Database::connect(":memory:").await.unwrap();
        db.save_outcome(&outcome(SettlementStatus::Confirmed)).await.unwrap();
        db.save_outcome(&outcome(SettlementStatus::Failed)).await.unwrap();

        let rows = db.recent_outcomes(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].network, "testnet");
        assert_eq!(rows[0].amount, "998000000");
    }

    #[tokio::test]
    async fn test_daily_stats_counts_by_status() {
        let db = Database::connect(":memory:").await.unwrap();
        db.save_outcome(&outcome(SettlementStatus::Confirmed)).await.unwrap();
        db.save_outcome(&outcome(SettlementStatus::Confirmed)).await.unwrap();
        db.save_outcome(&outcome(SettlementStatus::Failed)).await.unwrap();

        let stats = db.daily_stats().await.unwrap();
        assert_eq!(stats.trades, 3);
        assert_eq!(stats.confirmed, 2);
        assert_eq!(stats.failed, 1);
    }
}
