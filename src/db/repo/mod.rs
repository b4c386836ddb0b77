//! Repository layer for database operations.
//!
//! `Repository` wraps the pool for read paths; multi-step mutations go
//! through the `*_tx` free functions in the submodules, which take a
//! `&mut SqliteConnection` so the service layer can compose them inside a
//! single transaction (all-or-nothing per logical operation):
//! - `ledger.rs` - ledger entry operations
//! - `lots.rs` - stock lot operations
//! - `instances.rs` - strategy instance operations
//! - `signals.rs` - reinvest signal operations
//! - `imports.rs` - csv import records
//!
//! All decimals are stored as canonical TEXT and summed in Rust, never
//! with SQL SUM (SQLite's aggregate returns REAL and would lose
//! precision).

pub mod imports;
pub mod instances;
pub mod ledger;
pub mod lots;
pub mod signals;

use crate::domain::{Account, Decimal, PremiumPolicy, Symbol, Underlying, WheelCategory, WheelTarget};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

/// Parse a TEXT decimal column, logging and defaulting to zero on
/// corruption rather than failing the whole read.
pub(crate) fn parse_decimal_field(field: &str, value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|e| {
        warn!(field = field, value = %value, error = %e, "Failed to parse decimal column, using default");
        Decimal::default()
    })
}

pub(crate) fn parse_opt_decimal_field(field: &str, value: Option<String>) -> Option<Decimal> {
    value.map(|v| parse_decimal_field(field, &v))
}

pub(crate) fn parse_opt_policy(value: Option<String>) -> Option<PremiumPolicy> {
    value.as_deref().and_then(PremiumPolicy::parse)
}

fn account_from_row(row: &sqlx::sqlite::SqliteRow) -> Account {
    let free_cash: String = row.get("free_cash");
    let cashflow_reserve: String = row.get("cashflow_reserve");
    let onboarding: i64 = row.get("onboarding_complete");
    Account {
        id: row.get("id"),
        name: row.get("name"),
        free_cash: parse_decimal_field("free_cash", &free_cash),
        cashflow_reserve: parse_decimal_field("cashflow_reserve", &cashflow_reserve),
        onboarding_complete: onboarding != 0,
        premium_policy_default: parse_opt_policy(row.get("premium_policy_default")),
    }
}

fn underlying_from_row(row: &sqlx::sqlite::SqliteRow) -> Underlying {
    let symbol: String = row.get("symbol");
    let category: Option<String> = row.get("wheel_category");
    Underlying {
        id: row.get("id"),
        account_id: row.get("account_id"),
        symbol: Symbol::new(&symbol),
        premium_policy_override: parse_opt_policy(row.get("premium_policy_override")),
        wheel_category: category.as_deref().and_then(WheelCategory::parse),
        current_price: parse_opt_decimal_field("current_price", row.get("current_price")),
    }
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// The underlying pool, for beginning service-level transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Account operations
    // =========================================================================

    pub async fn create_account(
        &self,
        name: &str,
        premium_policy_default: Option<PremiumPolicy>,
    ) -> Result<Account, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (name, premium_policy_default)
            VALUES (?, ?)
            "#,
        )
        .bind(name)
        .bind(premium_policy_default.map(|p| p.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(Account {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            free_cash: Decimal::zero(),
            cashflow_reserve: Decimal::zero(),
            onboarding_complete: false,
            premium_policy_default,
        })
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(account_from_row))
    }

    pub async fn get_account_by_name(&self, name: &str) -> Result<Option<Account>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM accounts WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(account_from_row))
    }

    /// Flip the onboarding flag; from then on trade entry adjusts cash.
    pub async fn set_onboarding_complete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET onboarding_complete = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Underlying operations
    // =========================================================================

    pub async fn get_underlying(&self, id: i64) -> Result<Option<Underlying>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM underlyings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(underlying_from_row))
    }

    pub async fn list_underlyings(&self, account_id: i64) -> Result<Vec<Underlying>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM underlyings WHERE account_id = ? ORDER BY symbol")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(underlying_from_row).collect())
    }

    pub async fn set_underlying_price(
        &self,
        id: i64,
        price: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE underlyings SET current_price = ? WHERE id = ?")
            .bind(price.to_canonical_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Wheel target operations
    // =========================================================================

    /// Replace the full target set for an account atomically.
    pub async fn replace_wheel_targets(
        &self,
        account_id: i64,
        targets: &[WheelTarget],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM wheel_targets WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        for target in targets {
            sqlx::query(
                "INSERT INTO wheel_targets (account_id, category, target_pct) VALUES (?, ?, ?)",
            )
            .bind(account_id)
            .bind(target.category.as_str())
            .bind(target.target_pct.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_wheel_targets(
        &self,
        account_id: i64,
    ) -> Result<Vec<WheelTarget>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT category, target_pct FROM wheel_targets WHERE account_id = ? ORDER BY category",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let category: String = row.get("category");
                let target_pct: String = row.get("target_pct");
                WheelCategory::parse(&category).map(|category| WheelTarget {
                    category,
                    target_pct: parse_decimal_field("target_pct", &target_pct),
                })
            })
            .collect())
    }
}

// =============================================================================
// Transaction-scoped helpers
// =============================================================================

/// Load an account inside a transaction. The onboarding gate is read here
/// once and threaded through the rest of the write.
pub async fn get_account_tx(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Account>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(account_from_row))
}

/// Apply a signed delta to free cash. Read-modify-write in Rust to keep
/// decimal precision.
pub async fn adjust_free_cash_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    delta: Decimal,
) -> Result<(), sqlx::Error> {
    if delta.is_zero() {
        return Ok(());
    }
    let row = sqlx::query("SELECT free_cash FROM accounts WHERE id = ?")
        .bind(account_id)
        .fetch_one(&mut *conn)
        .await?;
    let current: String = row.get("free_cash");
    let updated = parse_decimal_field("free_cash", &current) + delta;

    sqlx::query("UPDATE accounts SET free_cash = ? WHERE id = ?")
        .bind(updated.to_canonical_string())
        .bind(account_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Apply a signed delta to the cashflow reserve earmark.
pub async fn adjust_cashflow_reserve_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    delta: Decimal,
) -> Result<(), sqlx::Error> {
    if delta.is_zero() {
        return Ok(());
    }
    let row = sqlx::query("SELECT cashflow_reserve FROM accounts WHERE id = ?")
        .bind(account_id)
        .fetch_one(&mut *conn)
        .await?;
    let current: String = row.get("cashflow_reserve");
    let updated = parse_decimal_field("cashflow_reserve", &current) + delta;

    sqlx::query("UPDATE accounts SET cashflow_reserve = ? WHERE id = ?")
        .bind(updated.to_canonical_string())
        .bind(account_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Find or create the underlying for a symbol within an account.
pub async fn get_or_create_underlying_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    symbol: &Symbol,
) -> Result<Underlying, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO underlyings (account_id, symbol)
        VALUES (?, ?)
        ON CONFLICT(account_id, symbol) DO NOTHING
        "#,
    )
    .bind(account_id)
    .bind(symbol.as_str())
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query("SELECT * FROM underlyings WHERE account_id = ? AND symbol = ?")
        .bind(account_id)
        .bind(symbol.as_str())
        .fetch_one(&mut *conn)
        .await?;
    Ok(underlying_from_row(&row))
}

pub async fn set_underlying_policy_override_tx(
    conn: &mut SqliteConnection,
    underlying_id: i64,
    policy: PremiumPolicy,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE underlyings SET premium_policy_override = ? WHERE id = ?")
        .bind(policy.as_str())
        .bind(underlying_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_underlying_category_tx(
    conn: &mut SqliteConnection,
    underlying_id: i64,
    category: WheelCategory,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE underlyings SET wheel_category = ? WHERE id = ?")
        .bind(category.as_str())
        .bind(underlying_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
