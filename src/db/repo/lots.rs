//! Stock lot operations.

use crate::db::repo::{parse_decimal_field, Repository};
use crate::domain::{Decimal, StockLot, TimeMs};
use crate::engine::{ConsumePlan, NewLot, ReductionPlan};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

fn lot_from_row(row: &sqlx::sqlite::SqliteRow) -> StockLot {
    let quantity: String = row.get("quantity");
    let remaining: String = row.get("remaining");
    let cost_basis: String = row.get("cost_basis");
    let premium_reduction: String = row.get("premium_reduction");

    StockLot {
        id: row.get("id"),
        account_id: row.get("account_id"),
        underlying_id: row.get("underlying_id"),
        quantity: parse_decimal_field("quantity", &quantity),
        remaining: parse_decimal_field("remaining", &remaining),
        cost_basis: parse_decimal_field("cost_basis", &cost_basis),
        premium_reduction: parse_decimal_field("premium_reduction", &premium_reduction),
        acquired_at: TimeMs::new(row.get("acquired_at")),
    }
}

/// Insert a planned lot, returning its id.
pub async fn insert_lot_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    underlying_id: i64,
    lot: &NewLot,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO stock_lots
        (account_id, underlying_id, quantity, remaining, cost_basis, acquired_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account_id)
    .bind(underlying_id)
    .bind(lot.quantity.to_canonical_string())
    .bind(lot.quantity.to_canonical_string())
    .bind(lot.cost_basis.to_canonical_string())
    .bind(lot.acquired_at.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Open lots for one underlying, FIFO order.
pub async fn open_lots_tx(
    conn: &mut SqliteConnection,
    underlying_id: i64,
) -> Result<Vec<StockLot>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM stock_lots
        WHERE underlying_id = ? AND remaining != '0'
        ORDER BY acquired_at ASC, id ASC
        "#,
    )
    .bind(underlying_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(lot_from_row).collect())
}

/// Apply a consume plan: decrement each portion's remaining and insert
/// the synthesized short lot if present.
pub async fn apply_consume_plan_tx(
    conn: &mut SqliteConnection,
    account_id: i64,
    underlying_id: i64,
    plan: &ConsumePlan,
) -> Result<(), sqlx::Error> {
    for portion in &plan.portions {
        sqlx::query("UPDATE stock_lots SET remaining = ? WHERE id = ?")
            .bind(portion.new_remaining.to_canonical_string())
            .bind(portion.lot_id)
            .execute(&mut *conn)
            .await?;
    }

    if let Some(short) = &plan.short_lot {
        insert_lot_tx(conn, account_id, underlying_id, short).await?;
    }

    Ok(())
}

/// Apply a reduction plan: accumulate each lot's premium reduction.
/// Read-modify-write in Rust so TEXT decimals never pass through SQLite
/// arithmetic.
pub async fn apply_reduction_plan_tx(
    conn: &mut SqliteConnection,
    plan: &ReductionPlan,
) -> Result<(), sqlx::Error> {
    for reduction in &plan.reductions {
        let row = sqlx::query("SELECT premium_reduction FROM stock_lots WHERE id = ?")
            .bind(reduction.lot_id)
            .fetch_one(&mut *conn)
            .await?;
        let current: String = row.get("premium_reduction");
        let updated = parse_decimal_field("premium_reduction", &current) + reduction.amount;

        sqlx::query("UPDATE stock_lots SET premium_reduction = ? WHERE id = ?")
            .bind(updated.to_canonical_string())
            .bind(reduction.lot_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

impl Repository {
    /// All open lots for an account (portfolio / wheel read models).
    pub async fn list_open_lots(&self, account_id: i64) -> Result<Vec<StockLot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM stock_lots
            WHERE account_id = ? AND remaining != '0'
            ORDER BY underlying_id ASC, acquired_at ASC, id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(lot_from_row).collect())
    }

    /// Open lots for one underlying, FIFO order (read path).
    pub async fn list_open_lots_for_underlying(
        &self,
        underlying_id: i64,
    ) -> Result<Vec<StockLot>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        open_lots_tx(&mut conn, underlying_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::db::repo::get_or_create_underlying_tx;
    use crate::domain::Symbol;
    use crate::engine::{plan_consume, plan_reduce_basis, OversellMode};
    use std::str::FromStr;
    use tempfile::TempDir;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn setup() -> (Repository, i64, i64, TempDir) {
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
        let underlying = get_or_create_underlying_tx(&mut conn, account.id, &Symbol::new("MSFT"))
            .await
            .unwrap();
        drop(conn);

        (repo, account.id, underlying.id, temp_dir)
    }

    #[tokio::test]
    async fn test_insert_and_list_open_lots() {
        let (repo, account_id, underlying_id, _temp) = setup().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        insert_lot_tx(
            &mut conn,
            account_id,
            underlying_id,
            &NewLot {
                quantity: dec("100"),
                cost_basis: dec("1000"),
                acquired_at: TimeMs::new(1000),
            },
        )
        .await
        .unwrap();
        drop(conn);

        let lots = repo.list_open_lots(account_id).await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, dec("100"));
        assert_eq!(lots[0].remaining, dec("100"));
        assert_eq!(lots[0].premium_reduction, Decimal::zero());
    }

    #[tokio::test]
    async fn test_consume_plan_roundtrip_through_db() {
        let (repo, account_id, underlying_id, _temp) = setup().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        for (qty, basis, at) in [("100", "1000", 1000), ("50", "600", 2000)] {
            insert_lot_tx(
                &mut conn,
                account_id,
                underlying_id,
                &NewLot {
                    quantity: dec(qty),
                    cost_basis: dec(basis),
                    acquired_at: TimeMs::new(at),
                },
            )
            .await
            .unwrap();
        }

        let lots = open_lots_tx(&mut conn, underlying_id).await.unwrap();
        let plan = plan_consume(&lots, dec("120"), dec("15"), TimeMs::new(3000), OversellMode::Short)
            .unwrap();
        apply_consume_plan_tx(&mut conn, account_id, underlying_id, &plan)
            .await
            .unwrap();

        let after = open_lots_tx(&mut conn, underlying_id).await.unwrap();
        // First lot fully consumed and filtered out of open lots.
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].remaining, dec("30"));
    }

    #[tokio::test]
    async fn test_reduction_plan_accumulates() {
        let (repo, account_id, underlying_id, _temp) = setup().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        insert_lot_tx(
            &mut conn,
            account_id,
            underlying_id,
            &NewLot {
                quantity: dec("100"),
                cost_basis: dec("1000"),
                acquired_at: TimeMs::new(1000),
            },
        )
        .await
        .unwrap();

        let lots = open_lots_tx(&mut conn, underlying_id).await.unwrap();
        let plan = plan_reduce_basis(&lots, dec("40"));
        apply_reduction_plan_tx(&mut conn, &plan).await.unwrap();
        apply_reduction_plan_tx(&mut conn, &plan).await.unwrap();

        let after = open_lots_tx(&mut conn, underlying_id).await.unwrap();
        assert_eq!(after[0].premium_reduction, dec("80"));
    }

    #[tokio::test]
    async fn test_short_lot_persisted_with_negative_remaining() {
        let (repo, account_id, underlying_id, _temp) = setup().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        let plan = plan_consume(&[], dec("10"), dec("5"), TimeMs::new(1000), OversellMode::Short)
            .unwrap();
        apply_consume_plan_tx(&mut conn, account_id, underlying_id, &plan)
            .await
            .unwrap();

        let lots = open_lots_tx(&mut conn, underlying_id).await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, dec("-10"));
        assert_eq!(lots[0].remaining, dec("-10"));
        assert_eq!(lots[0].cost_basis, dec("-50"));
    }
}
