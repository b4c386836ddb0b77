//! Strategy instance operations.

use crate::db::repo::{parse_opt_decimal_field, parse_opt_policy, parse_decimal_field, Repository};
use crate::domain::{
    CallPut, Decimal, FinalizationReason, InstanceStatus, OptionAction, PremiumPolicy,
    StrategyInstance, TimeMs,
};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::warn;

fn parse_expiration(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!(expiration = %s, error = %e, "Failed to parse expiration date, using epoch");
        NaiveDate::from_ymd_opt(1970, 1, 1).expect("static date")
    })
}

fn instance_from_row(row: &sqlx::sqlite::SqliteRow) -> StrategyInstance {
    let side: String = row.get("side");
    let call_put: String = row.get("call_put");
    let strike: String = row.get("strike");
    let expiration: String = row.get("expiration");
    let quantity: String = row.get("quantity");
    let status: String = row.get("status");
    let reason: Option<String> = row.get("finalization_reason");

    StrategyInstance {
        id: row.get("id"),
        account_id: row.get("account_id"),
        underlying_id: row.get("underlying_id"),
        side: OptionAction::parse(&side).unwrap_or(OptionAction::Sto),
        call_put: CallPut::parse(&call_put).unwrap_or(CallPut::Call),
        strike: parse_decimal_field("strike", &strike),
        expiration: parse_expiration(&expiration),
        quantity: parse_decimal_field("quantity", &quantity),
        status: InstanceStatus::parse(&status).unwrap_or(InstanceStatus::Open),
        finalization_reason: reason.as_deref().and_then(FinalizationReason::parse),
        finalized_at: row
            .get::<Option<i64>, _>("finalized_at")
            .map(TimeMs::new),
        realized_option_profit: parse_opt_decimal_field(
            "realized_option_profit",
            row.get("realized_option_profit"),
        ),
        premium_policy_override: parse_opt_policy(row.get("premium_policy_override")),
        applied_policy: parse_opt_policy(row.get("applied_policy")),
        opened_at: TimeMs::new(row.get("opened_at")),
    }
}

/// A new OPEN instance from an opening trade (STO/BTO).
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub account_id: i64,
    pub underlying_id: i64,
    pub side: OptionAction,
    pub call_put: CallPut,
    pub strike: Decimal,
    pub expiration: NaiveDate,
    pub quantity: Decimal,
    pub premium_policy_override: Option<PremiumPolicy>,
    pub opened_at: TimeMs,
}

pub async fn insert_instance_tx(
    conn: &mut SqliteConnection,
    instance: &NewInstance,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO strategy_instances
        (account_id, underlying_id, side, call_put, strike, expiration, quantity,
         status, premium_policy_override, opened_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'OPEN', ?, ?)
        "#,
    )
    .bind(instance.account_id)
    .bind(instance.underlying_id)
    .bind(instance.side.as_str())
    .bind(instance.call_put.as_str())
    .bind(instance.strike.to_canonical_string())
    .bind(instance.expiration.format("%Y-%m-%d").to_string())
    .bind(instance.quantity.to_canonical_string())
    .bind(instance.premium_policy_override.map(|p| p.as_str()))
    .bind(instance.opened_at.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_instance_tx(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<StrategyInstance>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM strategy_instances WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(instance_from_row))
}

/// Match a closing trade to the newest OPEN instance for the contract.
pub async fn find_open_instance_tx(
    conn: &mut SqliteConnection,
    underlying_id: i64,
    call_put: CallPut,
    strike: Decimal,
    expiration: NaiveDate,
) -> Result<Option<StrategyInstance>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT * FROM strategy_instances
        WHERE underlying_id = ? AND call_put = ? AND strike = ? AND expiration = ?
          AND status = 'OPEN'
        ORDER BY opened_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(underlying_id)
    .bind(call_put.as_str())
    .bind(strike.to_canonical_string())
    .bind(expiration.format("%Y-%m-%d").to_string())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.as_ref().map(instance_from_row))
}

/// OPEN -> FINALIZED, recording NROP and the policy that actually ran.
/// `applied_policy` stays NULL when finalize had no premium effect to apply,
/// so a later reopen knows there is nothing to reverse.
pub async fn mark_finalized_tx(
    conn: &mut SqliteConnection,
    id: i64,
    reason: FinalizationReason,
    finalized_at: TimeMs,
    nrop: Decimal,
    applied_policy: Option<PremiumPolicy>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE strategy_instances
        SET status = 'FINALIZED', finalization_reason = ?, finalized_at = ?,
            realized_option_profit = ?, applied_policy = ?
        WHERE id = ?
        "#,
    )
    .bind(reason.as_str())
    .bind(finalized_at.as_i64())
    .bind(nrop.to_canonical_string())
    .bind(applied_policy.map(|p| p.as_str()))
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// FINALIZED -> OPEN, clearing everything finalize wrote.
pub async fn mark_reopened_tx(conn: &mut SqliteConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE strategy_instances
        SET status = 'OPEN', finalization_reason = NULL, finalized_at = NULL,
            realized_option_profit = NULL, applied_policy = NULL
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Repository {
    pub async fn get_instance(&self, id: i64) -> Result<Option<StrategyInstance>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM strategy_instances WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(instance_from_row))
    }

    pub async fn list_instances(
        &self,
        account_id: i64,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<StrategyInstance>, sqlx::Error> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT * FROM strategy_instances
                    WHERE account_id = ? AND status = ?
                    ORDER BY opened_at DESC, id DESC
                    "#,
                )
                .bind(account_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM strategy_instances
                    WHERE account_id = ?
                    ORDER BY opened_at DESC, id DESC
                    "#,
                )
                .bind(account_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().map(instance_from_row).collect())
    }

    /// Reconcile repair: rewrite a drifted or missing NROP.
    pub async fn update_instance_nrop(
        &self,
        id: i64,
        nrop: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE strategy_instances SET realized_option_profit = ? WHERE id = ?")
            .bind(nrop.to_canonical_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reconcile repair: clear orphaned finalization fields on an OPEN
    /// instance left by a partial write.
    pub async fn clear_orphan_finalization_fields(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE strategy_instances
            SET finalization_reason = NULL, finalized_at = NULL,
                realized_option_profit = NULL, applied_policy = NULL
            WHERE id = ? AND status = 'OPEN'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
