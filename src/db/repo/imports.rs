//! CSV import record persistence.
//!
//! Preview stores the raw file alongside its counts; commit later re-reads
//! the stored bytes so the committed rows are exactly what was previewed.

use crate::db::repo::Repository;
use crate::domain::TimeMs;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub id: String,
    pub account_id: i64,
    pub file_hash: String,
    pub raw_content: Vec<u8>,
    pub row_count: i64,
    pub new_count: i64,
    pub duplicate_count: i64,
    pub created_at: TimeMs,
    pub committed_at: Option<TimeMs>,
}

impl ImportRecord {
    pub fn is_committed(&self) -> bool {
        self.committed_at.is_some()
    }
}

fn import_from_row(row: &sqlx::sqlite::SqliteRow) -> ImportRecord {
    ImportRecord {
        id: row.get("id"),
        account_id: row.get("account_id"),
        file_hash: row.get("file_hash"),
        raw_content: row.get("raw_content"),
        row_count: row.get("row_count"),
        new_count: row.get("new_count"),
        duplicate_count: row.get("duplicate_count"),
        created_at: TimeMs::new(row.get("created_at")),
        committed_at: row.get::<Option<i64>, _>("committed_at").map(TimeMs::new),
    }
}

pub async fn mark_committed_tx(
    conn: &mut SqliteConnection,
    id: &str,
    committed_at: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE csv_imports SET committed_at = ? WHERE id = ?")
        .bind(committed_at.as_i64())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl Repository {
    pub async fn insert_import(&self, record: &ImportRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO csv_imports
            (id, account_id, file_hash, raw_content, row_count, new_count,
             duplicate_count, created_at, committed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.account_id)
        .bind(&record.file_hash)
        .bind(&record.raw_content)
        .bind(record.row_count)
        .bind(record.new_count)
        .bind(record.duplicate_count)
        .bind(record.created_at.as_i64())
        .bind(record.committed_at.map(|t| t.as_i64()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_import(&self, id: &str) -> Result<Option<ImportRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM csv_imports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(import_from_row))
    }

    /// File-level dedup: has this exact file already been committed into
    /// the account?
    pub async fn committed_file_hash_exists(
        &self,
        account_id: i64,
        file_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM csv_imports
            WHERE account_id = ? AND file_hash = ? AND committed_at IS NOT NULL
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn list_imports(&self, account_id: i64) -> Result<Vec<ImportRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM csv_imports WHERE account_id = ? ORDER BY created_at DESC, id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(import_from_row).collect())
    }
}
