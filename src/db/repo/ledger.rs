//! Ledger entry operations.

use crate::db::repo::{parse_decimal_field, Repository};
use crate::domain::{Decimal, EntryKind, LedgerEntry, TimeMs};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::warn;

/// A ledger entry about to be written; id assigned by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub underlying_id: Option<i64>,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub occurred_at: TimeMs,
    pub instance_id: Option<i64>,
    pub external_ref: Option<String>,
    pub fingerprint: Option<String>,
    pub description: Option<String>,
    pub is_closing: bool,
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> LedgerEntry {
    let kind: String = row.get("kind");
    let amount: String = row.get("amount");
    let is_closing: i64 = row.get("is_closing");

    LedgerEntry {
        id: row.get("id"),
        account_id: row.get("account_id"),
        underlying_id: row.get("underlying_id"),
        kind: EntryKind::parse(&kind).unwrap_or_else(|| {
            warn!(kind = %kind, "Unknown ledger entry kind, treating as ADJUSTMENT");
            EntryKind::Adjustment
        }),
        amount: parse_decimal_field("amount", &amount),
        occurred_at: TimeMs::new(row.get("occurred_at")),
        instance_id: row.get("instance_id"),
        external_ref: row.get("external_ref"),
        fingerprint: row.get("fingerprint"),
        description: row.get("description"),
        is_closing: is_closing != 0,
    }
}

/// Insert one entry, returning its id.
pub async fn insert_entry_tx(
    conn: &mut SqliteConnection,
    entry: &NewLedgerEntry,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO ledger_entries
        (account_id, underlying_id, kind, amount, occurred_at, instance_id,
         external_ref, fingerprint, description, is_closing)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.account_id)
    .bind(entry.underlying_id)
    .bind(entry.kind.as_str())
    .bind(entry.amount.to_canonical_string())
    .bind(entry.occurred_at.as_i64())
    .bind(entry.instance_id)
    .bind(entry.external_ref.as_deref())
    .bind(entry.fingerprint.as_deref())
    .bind(entry.description.as_deref())
    .bind(entry.is_closing as i64)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// All entries linked to an instance, oldest first. Used by NROP
/// computation inside finalize transactions.
pub async fn entries_for_instance_tx(
    conn: &mut SqliteConnection,
    instance_id: i64,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM ledger_entries WHERE instance_id = ? ORDER BY occurred_at ASC, id ASC",
    )
    .bind(instance_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(entry_from_row).collect())
}

/// Delete the entries a finalize call wrote, returning them so the caller
/// can reverse their cash effect.
pub async fn delete_closing_entries_tx(
    conn: &mut SqliteConnection,
    instance_id: i64,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM ledger_entries WHERE instance_id = ? AND is_closing = 1",
    )
    .bind(instance_id)
    .fetch_all(&mut *conn)
    .await?;
    let deleted: Vec<LedgerEntry> = rows.iter().map(entry_from_row).collect();

    sqlx::query("DELETE FROM ledger_entries WHERE instance_id = ? AND is_closing = 1")
        .bind(instance_id)
        .execute(&mut *conn)
        .await?;

    Ok(deleted)
}

/// Dedup layer 2: does any entry for this account carry the external ref?
pub async fn external_ref_exists_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    external_ref: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT 1 FROM ledger_entries WHERE account_id = ? AND external_ref = ? LIMIT 1",
    )
    .bind(account_id)
    .bind(external_ref)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.is_some())
}

/// Dedup layer 3: does any entry for this account carry the fingerprint?
pub async fn fingerprint_exists_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    fingerprint: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT 1 FROM ledger_entries WHERE account_id = ? AND fingerprint = ? LIMIT 1",
    )
    .bind(account_id)
    .bind(fingerprint)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.is_some())
}

impl Repository {
    /// Statement read model: entries for an account, newest first.
    pub async fn list_entries(
        &self,
        account_id: i64,
        from: Option<TimeMs>,
        to: Option<TimeMs>,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let from_ms = from.map(|t| t.as_i64()).unwrap_or(i64::MIN);
        let to_ms = to.map(|t| t.as_i64()).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT * FROM ledger_entries
            WHERE account_id = ? AND occurred_at >= ? AND occurred_at <= ?
            ORDER BY occurred_at DESC, id DESC
            "#,
        )
        .bind(account_id)
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

    /// All entries linked to an instance (read path for reconcile).
    pub async fn list_entries_for_instance(
        &self,
        instance_id: i64,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM ledger_entries WHERE instance_id = ? ORDER BY occurred_at ASC, id ASC",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }
}
