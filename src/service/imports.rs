//! CSV import preview and commit.
//!
//! Preview evaluates the three dedup layers without touching the ledger
//! and persists the raw file. Commit replays the stored bytes in a single
//! transaction; committing twice is a no-op that reports the stored
//! counts.

use crate::config::Config;
use crate::db::repo::imports::{mark_committed_tx, ImportRecord};
use crate::db::repo::ledger::{external_ref_exists_tx, fingerprint_exists_tx};
use crate::db::repo::{get_account_tx, Repository};
use crate::domain::{Account, TimeMs};
use crate::error::AppError;
use crate::import::fingerprint::file_hash;
use crate::import::{parse_trades, ParsedTrade, RowStatus, TradeDetails};
use crate::service::trades::{
    apply_option_trade_tx, apply_stock_trade_tx, OptionTradeInput, Provenance, StockTradeInput,
};
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPreview {
    pub row: usize,
    pub symbol: String,
    pub action: String,
    pub status: RowStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub import_id: String,
    pub row_count: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub rows: Vec<RowPreview>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub import_id: String,
    pub imported: i64,
    pub duplicates: i64,
    pub already_committed: bool,
}

#[derive(Clone)]
pub struct ImportService {
    repo: Arc<Repository>,
    config: Config,
}

impl ImportService {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }

    /// Evaluate one row against the dedup layers. `batch_fingerprints`
    /// carries fingerprints already accepted from earlier rows of the
    /// same file.
    async fn evaluate_row(
        conn: &mut SqliteConnection,
        account_id: i64,
        trade: &ParsedTrade,
        file_is_duplicate: bool,
        batch_fingerprints: &mut HashSet<String>,
    ) -> Result<(RowStatus, String), AppError> {
        let fingerprint = trade.fingerprint(account_id);

        if file_is_duplicate {
            return Ok((RowStatus::DuplicateFile, fingerprint));
        }
        if let Some(external_ref) = &trade.external_ref {
            if external_ref_exists_tx(conn, account_id, external_ref).await? {
                return Ok((RowStatus::DuplicateExternalRef, fingerprint));
            }
        }
        if batch_fingerprints.contains(&fingerprint)
            || fingerprint_exists_tx(conn, account_id, &fingerprint).await?
        {
            return Ok((RowStatus::DuplicateFingerprint, fingerprint));
        }

        batch_fingerprints.insert(fingerprint.clone());
        Ok((RowStatus::New, fingerprint))
    }

    /// Parse, dedup-evaluate, and persist the upload. Nothing in the
    /// ledger changes until commit.
    pub async fn preview(
        &self,
        account_id: i64,
        bytes: Vec<u8>,
    ) -> Result<ImportPreview, AppError> {
        let account = self
            .repo
            .get_account(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {account_id}")))?;

        let trades = parse_trades(&bytes, &account.name)?;
        let hash = file_hash(&bytes);
        let file_is_duplicate = self
            .repo
            .committed_file_hash_exists(account_id, &hash)
            .await?;

        let mut conn = self.repo.pool().acquire().await?;
        let mut batch_fingerprints = HashSet::new();
        let mut rows = Vec::with_capacity(trades.len());
        let mut new_count = 0;

        for trade in &trades {
            let (status, _) = Self::evaluate_row(
                &mut conn,
                account_id,
                trade,
                file_is_duplicate,
                &mut batch_fingerprints,
            )
            .await?;
            if status == RowStatus::New {
                new_count += 1;
            }
            rows.push(RowPreview {
                row: trade.row,
                symbol: trade.symbol.as_str().to_string(),
                action: trade.details.action_str().to_string(),
                status,
            });
        }
        drop(conn);

        let import_id = Uuid::new_v4().to_string();
        let duplicate_count = trades.len() - new_count;
        self.repo
            .insert_import(&ImportRecord {
                id: import_id.clone(),
                account_id,
                file_hash: hash,
                raw_content: bytes,
                row_count: trades.len() as i64,
                new_count: new_count as i64,
                duplicate_count: duplicate_count as i64,
                created_at: TimeMs::now(),
                committed_at: None,
            })
            .await?;

        info!(
            account_id,
            import_id = %import_id,
            rows = trades.len(),
            new = new_count,
            "Previewed csv import"
        );

        Ok(ImportPreview {
            import_id,
            row_count: trades.len(),
            new_count,
            duplicate_count,
            rows,
        })
    }

    /// Re-evaluate the stored file and write the NEW rows, all inside one
    /// transaction. Safe to call repeatedly.
    pub async fn commit(&self, import_id: &str) -> Result<ImportSummary, AppError> {
        let record = self
            .repo
            .get_import(import_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("import {import_id}")))?;

        if record.is_committed() {
            return Ok(ImportSummary {
                import_id: record.id,
                imported: record.new_count,
                duplicates: record.duplicate_count,
                already_committed: true,
            });
        }

        let file_is_duplicate = self
            .repo
            .committed_file_hash_exists(record.account_id, &record.file_hash)
            .await?;

        let mut tx = self.repo.pool().begin().await?;
        let account = get_account_tx(&mut *tx, record.account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", record.account_id)))?;

        let trades = parse_trades(&record.raw_content, &account.name)?;

        let mut imported = 0;
        let mut duplicates = 0;
        // Entries written earlier in this transaction are already visible
        // to the existence checks; the set keeps preview and commit on the
        // same evaluation path.
        let mut batch_fingerprints = HashSet::new();

        for trade in &trades {
            let (status, fingerprint) = Self::evaluate_row(
                &mut *tx,
                record.account_id,
                trade,
                file_is_duplicate,
                &mut batch_fingerprints,
            )
            .await?;
            if status != RowStatus::New {
                duplicates += 1;
                continue;
            }

            Self::apply_trade(&mut *tx, &account, trade, fingerprint, &self.config).await?;
            imported += 1;
        }

        mark_committed_tx(&mut *tx, &record.id, TimeMs::now()).await?;
        tx.commit().await?;

        info!(
            account_id = record.account_id,
            import_id = %record.id,
            imported,
            duplicates,
            "Committed csv import"
        );

        Ok(ImportSummary {
            import_id: record.id,
            imported,
            duplicates,
            already_committed: false,
        })
    }

    async fn apply_trade(
        conn: &mut SqliteConnection,
        account: &Account,
        trade: &ParsedTrade,
        fingerprint: String,
        config: &Config,
    ) -> Result<(), AppError> {
        let provenance = Provenance {
            external_ref: trade.external_ref.clone(),
            fingerprint: Some(fingerprint),
            description: trade.notes.clone(),
        };

        match &trade.details {
            TradeDetails::Stock { action } => {
                apply_stock_trade_tx(
                    conn,
                    account,
                    &StockTradeInput {
                        symbol: trade.symbol.clone(),
                        action: *action,
                        quantity: trade.quantity,
                        price: trade.price,
                        fees: trade.fees,
                        occurred_at: trade.occurred_at,
                    },
                    &provenance,
                    config.oversell_mode,
                )
                .await?;
            }
            TradeDetails::Option {
                action,
                expiration,
                strike,
                call_put,
            } => {
                apply_option_trade_tx(
                    conn,
                    account,
                    &OptionTradeInput {
                        symbol: trade.symbol.clone(),
                        action: *action,
                        call_put: *call_put,
                        strike: *strike,
                        expiration: *expiration,
                        quantity: trade.quantity,
                        price: trade.price,
                        fees: trade.fees,
                        occurred_at: trade.occurred_at,
                        premium_policy_override: None,
                        wheel_category_override: None,
                    },
                    &provenance,
                    config.reinvest_grace_hours,
                )
                .await?;
            }
        }
        Ok(())
    }
}
