//! Reinvest signal operations.

use crate::db::repo::{parse_decimal_field, parse_opt_decimal_field, Repository};
use crate::engine::SignalUpdate;
use crate::domain::{Decimal, ReinvestSignal, SignalStatus, TimeMs};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

fn signal_from_row(row: &sqlx::sqlite::SqliteRow) -> ReinvestSignal {
    let amount: String = row.get("amount");
    let status: String = row.get("status");
    ReinvestSignal {
        id: row.get("id"),
        account_id: row.get("account_id"),
        underlying_id: row.get("underlying_id"),
        instance_id: row.get("instance_id"),
        amount: parse_decimal_field("amount", &amount),
        status: SignalStatus::parse(&status).unwrap_or(SignalStatus::Created),
        due_at: TimeMs::new(row.get("due_at")),
        acknowledged_at: row
            .get::<Option<i64>, _>("acknowledged_at")
            .map(TimeMs::new),
        completed_amount: parse_opt_decimal_field(
            "completed_amount",
            row.get("completed_amount"),
        ),
    }
}

/// Create or refresh the signal for an instance. Re-finalizing an instance
/// that already has one resets it to CREATED with the new amount and due
/// time, clearing any stale user state.
pub async fn upsert_signal_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    underlying_id: i64,
    instance_id: i64,
    amount: Decimal,
    due_at: TimeMs,
) -> Result<i64, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reinvest_signals (account_id, underlying_id, instance_id, amount, status, due_at)
        VALUES (?, ?, ?, ?, 'CREATED', ?)
        ON CONFLICT(instance_id) DO UPDATE SET
            amount = excluded.amount,
            status = 'CREATED',
            due_at = excluded.due_at,
            acknowledged_at = NULL,
            completed_amount = NULL
        "#,
    )
    .bind(account_id)
    .bind(underlying_id)
    .bind(instance_id)
    .bind(amount.to_canonical_string())
    .bind(due_at.as_i64())
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query("SELECT id FROM reinvest_signals WHERE instance_id = ?")
        .bind(instance_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("id"))
}

pub async fn signal_for_instance_tx(
    conn: &mut SqliteConnection,
    instance_id: i64,
) -> Result<Option<ReinvestSignal>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM reinvest_signals WHERE instance_id = ?")
        .bind(instance_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(signal_from_row))
}

/// Delete the instance's signal unless the user already resolved it.
/// Returns true if a row was removed.
pub async fn delete_live_signal_tx(
    conn: &mut SqliteConnection,
    instance_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM reinvest_signals
        WHERE instance_id = ?
          AND status NOT IN ('COMPLETED', 'PARTIAL_COMPLETED', 'SKIPPED')
        "#,
    )
    .bind(instance_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

impl Repository {
    pub async fn get_signal(&self, id: i64) -> Result<Option<ReinvestSignal>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM reinvest_signals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(signal_from_row))
    }

    pub async fn list_signals(
        &self,
        account_id: i64,
        status: Option<SignalStatus>,
    ) -> Result<Vec<ReinvestSignal>, sqlx::Error> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT * FROM reinvest_signals
                    WHERE account_id = ? AND status = ?
                    ORDER BY due_at, id
                    "#,
                )
                .bind(account_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM reinvest_signals WHERE account_id = ? ORDER BY due_at, id",
                )
                .bind(account_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().map(signal_from_row).collect())
    }

    pub async fn signal_for_instance(
        &self,
        instance_id: i64,
    ) -> Result<Option<ReinvestSignal>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM reinvest_signals WHERE instance_id = ?")
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(signal_from_row))
    }

    /// Persist the outcome of a user action computed by the signal engine.
    pub async fn apply_signal_update(
        &self,
        id: i64,
        update: &SignalUpdate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE reinvest_signals
            SET status = ?, completed_amount = ?, acknowledged_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.completed_amount.map(|a| a.to_canonical_string()))
        .bind(update.acknowledged_at.as_i64())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// CREATED -> NOTIFIED once the due time passes.
    pub async fn mark_signal_notified(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE reinvest_signals SET status = 'NOTIFIED' WHERE id = ? AND status = 'CREATED'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::db::repo::get_or_create_underlying_tx;
    use crate::db::repo::instances::{insert_instance_tx, NewInstance};
    use crate::domain::{CallPut, OptionAction, Symbol};
    use chrono::NaiveDate;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn setup() -> (Repository, i64, i64, i64, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Repository::new(pool);
        let account = repo.create_account("a", None).await.unwrap();
        let mut conn = repo.pool().acquire().await.unwrap();
        let underlying = get_or_create_underlying_tx(&mut conn, account.id, &Symbol::new("SPY"))
            .await
            .unwrap();
        let instance_id = insert_instance_tx(
            &mut conn,
            &NewInstance {
                account_id: account.id,
                underlying_id: underlying.id,
                side: OptionAction::Sto,
                call_put: CallPut::Put,
                strike: dec("450"),
                expiration: NaiveDate::from_ymd_opt(2026, 9, 18).unwrap(),
                quantity: dec("1"),
                premium_policy_override: None,
                opened_at: TimeMs::new(1000),
            },
        )
        .await
        .unwrap();
        drop(conn);
        (repo, account.id, underlying.id, instance_id, temp_dir)
    }

    #[tokio::test]
    async fn test_upsert_resets_existing_signal() {
        let (repo, account_id, underlying_id, instance_id, _temp) = setup().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        let first = upsert_signal_tx(
            &mut conn,
            account_id,
            underlying_id,
            instance_id,
            dec("100"),
            TimeMs::new(5000),
        )
        .await
        .unwrap();

        // Simulate the user snoozing, then a re-finalize.
        sqlx::query("UPDATE reinvest_signals SET status = 'SNOOZED' WHERE id = ?")
            .bind(first)
            .execute(&mut *conn)
            .await
            .unwrap();

        let second = upsert_signal_tx(
            &mut conn,
            account_id,
            underlying_id,
            instance_id,
            dec("150"),
            TimeMs::new(9000),
        )
        .await
        .unwrap();
        assert_eq!(first, second);
        drop(conn);

        let signal = repo.get_signal(first).await.unwrap().unwrap();
        assert_eq!(signal.status, SignalStatus::Created);
        assert_eq!(signal.amount, dec("150"));
        assert_eq!(signal.due_at, TimeMs::new(9000));
        assert_eq!(signal.acknowledged_at, None);
    }

    #[tokio::test]
    async fn test_delete_live_signal_spares_terminal() {
        let (repo, account_id, underlying_id, instance_id, _temp) = setup().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        let id = upsert_signal_tx(
            &mut conn,
            account_id,
            underlying_id,
            instance_id,
            dec("100"),
            TimeMs::new(5000),
        )
        .await
        .unwrap();

        assert!(delete_live_signal_tx(&mut conn, instance_id).await.unwrap());
        assert!(signal_for_instance_tx(&mut conn, instance_id)
            .await
            .unwrap()
            .is_none());

        // Terminal signals survive reopen.
        upsert_signal_tx(
            &mut conn,
            account_id,
            underlying_id,
            instance_id,
            dec("100"),
            TimeMs::new(5000),
        )
        .await
        .unwrap();
        sqlx::query("UPDATE reinvest_signals SET status = 'COMPLETED' WHERE instance_id = ?")
            .bind(instance_id)
            .execute(&mut *conn)
            .await
            .unwrap();
        assert!(!delete_live_signal_tx(&mut conn, instance_id).await.unwrap());
        drop(conn);

        let kept = repo.signal_for_instance(instance_id).await.unwrap().unwrap();
        assert_eq!(kept.status, SignalStatus::Completed);
        let _ = id;
    }

    #[tokio::test]
    async fn test_mark_notified_only_from_created() {
        let (repo, account_id, underlying_id, instance_id, _temp) = setup().await;
        let mut conn = repo.pool().acquire().await.unwrap();
        let id = upsert_signal_tx(
            &mut conn,
            account_id,
            underlying_id,
            instance_id,
            dec("100"),
            TimeMs::new(5000),
        )
        .await
        .unwrap();
        drop(conn);

        assert!(repo.mark_signal_notified(id).await.unwrap());
        assert!(!repo.mark_signal_notified(id).await.unwrap());
        let signal = repo.get_signal(id).await.unwrap().unwrap();
        assert_eq!(signal.status, SignalStatus::Notified);
    }
}
