//! Trade entry: stock buys/sells, option opens/closes, cash deposits.
//!
//! Every public operation validates first, then runs all of its writes in
//! one transaction. The `*_tx` functions are shared with the CSV import
//! commit path, which batches many trades into a single transaction.

use crate::config::Config;
use crate::db::repo::instances::{find_open_instance_tx, insert_instance_tx, NewInstance};
use crate::db::repo::ledger::{insert_entry_tx, NewLedgerEntry};
use crate::db::repo::lots::{apply_consume_plan_tx, insert_lot_tx, open_lots_tx};
use crate::db::repo::{
    adjust_free_cash_tx, get_account_tx, get_or_create_underlying_tx,
    set_underlying_category_tx, Repository,
};
use crate::domain::{
    Account, CallPut, Decimal, EntryKind, InstrumentType, OptionAction, PremiumPolicy,
    StockAction, Symbol, TimeMs, WheelCategory,
};
use crate::engine::lots::{plan_acquire, plan_consume, OversellMode};
use crate::error::AppError;
use crate::import::fingerprint::{trade_fingerprint, FingerprintParts};
use crate::service::instances::finalize_instance_tx;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::info;

/// Shares per standard option contract.
pub const CONTRACT_MULTIPLIER: i64 = 100;

#[derive(Debug, Clone)]
pub struct StockTradeInput {
    pub symbol: Symbol,
    pub action: StockAction,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub occurred_at: TimeMs,
}

#[derive(Debug, Clone)]
pub struct OptionTradeInput {
    pub symbol: Symbol,
    pub action: OptionAction,
    pub call_put: CallPut,
    pub strike: Decimal,
    pub expiration: NaiveDate,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub occurred_at: TimeMs,
    pub premium_policy_override: Option<PremiumPolicy>,
    pub wheel_category_override: Option<WheelCategory>,
}

/// Import provenance stamped onto the ledger entries a trade writes.
/// Manual entry carries a computed fingerprint too, so a later CSV import
/// of the same trade dedups against it.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub external_ref: Option<String>,
    pub fingerprint: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTradeOutcome {
    pub entry_id: i64,
    /// The lot created by a BUY.
    pub lot_id: Option<i64>,
    /// Realized gain on the long portion of a SELL.
    pub realized_gain: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTradeOutcome {
    pub instance_id: i64,
    pub entry_ids: Vec<i64>,
    pub finalized: bool,
    pub nrop: Option<Decimal>,
}

fn validate_amounts(quantity: Decimal, price: Decimal, fees: Decimal) -> Result<(), AppError> {
    if !quantity.is_positive() {
        return Err(AppError::Validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if price.is_negative() {
        return Err(AppError::Validation(format!(
            "price must not be negative, got {price}"
        )));
    }
    if fees.is_negative() {
        return Err(AppError::Validation(format!(
            "fees must not be negative, got {fees}"
        )));
    }
    Ok(())
}

fn stock_fingerprint(account_id: i64, input: &StockTradeInput) -> String {
    trade_fingerprint(&FingerprintParts {
        account_id,
        occurred_at: input.occurred_at,
        symbol: &input.symbol,
        instrument: InstrumentType::Stock,
        action: input.action.as_str(),
        expiration: None,
        strike: None,
        call_put: None,
        quantity: input.quantity,
        price: input.price,
        fees: input.fees,
    })
}

fn option_fingerprint(account_id: i64, input: &OptionTradeInput) -> String {
    trade_fingerprint(&FingerprintParts {
        account_id,
        occurred_at: input.occurred_at,
        symbol: &input.symbol,
        instrument: InstrumentType::Option,
        action: input.action.as_str(),
        expiration: Some(input.expiration),
        strike: Some(input.strike),
        call_put: Some(input.call_put),
        quantity: input.quantity,
        price: input.price,
        fees: input.fees,
    })
}

/// Write one entry and mirror its signed amount into free cash when the
/// account has finished onboarding.
async fn write_entry_tx(
    conn: &mut SqliteConnection,
    account: &Account,
    entry: &NewLedgerEntry,
) -> Result<i64, AppError> {
    let id = insert_entry_tx(conn, entry).await?;
    if account.onboarding_complete {
        adjust_free_cash_tx(conn, account.id, entry.amount).await?;
    }
    Ok(id)
}

/// Apply a stock trade inside the caller's transaction. The account row is
/// loaded once per transaction by the caller and threaded through so the
/// onboarding gate is read consistently across a batch.
pub async fn apply_stock_trade_tx(
    conn: &mut SqliteConnection,
    account: &Account,
    input: &StockTradeInput,
    provenance: &Provenance,
    oversell_mode: OversellMode,
) -> Result<StockTradeOutcome, AppError> {
    validate_amounts(input.quantity, input.price, input.fees)?;
    if input.price.is_zero() {
        return Err(AppError::Validation(
            "stock price must be positive".to_string(),
        ));
    }

    let underlying = get_or_create_underlying_tx(conn, account.id, &input.symbol).await?;
    let gross = input.quantity * input.price;

    let (kind, amount, lot_id, realized_gain) = match input.action {
        StockAction::Buy => {
            let lot = plan_acquire(input.quantity, gross + input.fees, input.occurred_at);
            let lot_id = insert_lot_tx(conn, account.id, underlying.id, &lot).await?;
            (
                EntryKind::StockBuy,
                -(gross + input.fees),
                Some(lot_id),
                None,
            )
        }
        StockAction::Sell => {
            let lots = open_lots_tx(conn, underlying.id).await?;
            let plan = plan_consume(
                &lots,
                input.quantity,
                input.price,
                input.occurred_at,
                oversell_mode,
            )?;
            apply_consume_plan_tx(conn, account.id, underlying.id, &plan).await?;
            let short_id = None; // apply_consume_plan_tx owns the short insert
            (
                EntryKind::StockSell,
                gross - input.fees,
                short_id,
                Some(plan.realized_gain),
            )
        }
    };

    let entry_id = write_entry_tx(
        conn,
        account,
        &NewLedgerEntry {
            account_id: account.id,
            underlying_id: Some(underlying.id),
            kind,
            amount,
            occurred_at: input.occurred_at,
            instance_id: None,
            external_ref: provenance.external_ref.clone(),
            fingerprint: provenance.fingerprint.clone(),
            description: provenance.description.clone(),
            is_closing: false,
        },
    )
    .await?;

    Ok(StockTradeOutcome {
        entry_id,
        lot_id,
        realized_gain,
    })
}

/// Apply an option trade inside the caller's transaction. Opening actions
/// create a new OPEN instance; closing actions match and finalize the
/// newest OPEN instance for the contract.
pub async fn apply_option_trade_tx(
    conn: &mut SqliteConnection,
    account: &Account,
    input: &OptionTradeInput,
    provenance: &Provenance,
    grace_hours: i64,
) -> Result<OptionTradeOutcome, AppError> {
    validate_amounts(input.quantity, input.price, input.fees)?;
    if !input.strike.is_positive() {
        return Err(AppError::Validation(format!(
            "strike must be positive, got {}",
            input.strike
        )));
    }

    let underlying = get_or_create_underlying_tx(conn, account.id, &input.symbol).await?;
    if let Some(category) = input.wheel_category_override {
        set_underlying_category_tx(conn, underlying.id, category).await?;
    }

    let premium = input.quantity * input.price * Decimal::from_i64(CONTRACT_MULTIPLIER);
    let mut entry_ids = Vec::new();

    if input.action.is_opening() {
        let instance_id = insert_instance_tx(
            conn,
            &NewInstance {
                account_id: account.id,
                underlying_id: underlying.id,
                side: input.action,
                call_put: input.call_put,
                strike: input.strike,
                expiration: input.expiration,
                quantity: input.quantity,
                premium_policy_override: input.premium_policy_override,
                opened_at: input.occurred_at,
            },
        )
        .await?;

        let (kind, amount) = match input.action {
            OptionAction::Sto => (EntryKind::PremiumCredit, premium),
            _ => (EntryKind::PremiumDebit, -premium),
        };
        entry_ids.push(
            write_entry_tx(
                conn,
                account,
                &NewLedgerEntry {
                    account_id: account.id,
                    underlying_id: Some(underlying.id),
                    kind,
                    amount,
                    occurred_at: input.occurred_at,
                    instance_id: Some(instance_id),
                    external_ref: provenance.external_ref.clone(),
                    fingerprint: provenance.fingerprint.clone(),
                    description: provenance.description.clone(),
                    is_closing: false,
                },
            )
            .await?,
        );
        if input.fees.is_positive() {
            entry_ids.push(
                write_entry_tx(
                    conn,
                    account,
                    &NewLedgerEntry {
                        account_id: account.id,
                        underlying_id: Some(underlying.id),
                        kind: EntryKind::Fee,
                        amount: -input.fees,
                        occurred_at: input.occurred_at,
                        instance_id: Some(instance_id),
                        external_ref: None,
                        fingerprint: None,
                        description: provenance.description.clone(),
                        is_closing: false,
                    },
                )
                .await?,
            );
        }

        return Ok(OptionTradeOutcome {
            instance_id,
            entry_ids,
            finalized: false,
            nrop: None,
        });
    }

    // Closing action: match then finalize.
    let instance = find_open_instance_tx(
        conn,
        underlying.id,
        input.call_put,
        input.strike,
        input.expiration,
    )
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "no open {} {} {} instance for {}",
            input.call_put.as_str(),
            input.strike,
            input.expiration.format("%Y-%m-%d"),
            input.symbol
        ))
    })?;

    if !premium.is_zero() {
        let (kind, amount) = match input.action {
            OptionAction::Stc => (EntryKind::PremiumCredit, premium),
            _ => (EntryKind::PremiumDebit, -premium),
        };
        entry_ids.push(
            write_entry_tx(
                conn,
                account,
                &NewLedgerEntry {
                    account_id: account.id,
                    underlying_id: Some(underlying.id),
                    kind,
                    amount,
                    occurred_at: input.occurred_at,
                    instance_id: Some(instance.id),
                    external_ref: provenance.external_ref.clone(),
                    fingerprint: provenance.fingerprint.clone(),
                    description: provenance.description.clone(),
                    is_closing: true,
                },
            )
            .await?,
        );
    }
    if input.fees.is_positive() {
        entry_ids.push(
            write_entry_tx(
                conn,
                account,
                &NewLedgerEntry {
                    account_id: account.id,
                    underlying_id: Some(underlying.id),
                    kind: EntryKind::Fee,
                    amount: -input.fees,
                    occurred_at: input.occurred_at,
                    instance_id: Some(instance.id),
                    external_ref: None,
                    fingerprint: None,
                    description: provenance.description.clone(),
                    is_closing: true,
                },
            )
            .await?,
        );
    }

    let reason = input
        .action
        .finalization_reason()
        .ok_or_else(|| AppError::Validation(format!("{} is not a closing action", input.action.as_str())))?;
    let outcome = finalize_instance_tx(
        conn,
        account,
        &underlying,
        &instance,
        reason,
        input.occurred_at,
        grace_hours,
    )
    .await?;

    Ok(OptionTradeOutcome {
        instance_id: instance.id,
        entry_ids,
        finalized: true,
        nrop: Some(outcome.nrop),
    })
}

/// Transactional trade entry over the repository.
#[derive(Clone)]
pub struct TradeService {
    repo: Arc<Repository>,
    config: Config,
}

impl TradeService {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }

    async fn load_account_tx(
        conn: &mut SqliteConnection,
        account_id: i64,
    ) -> Result<Account, AppError> {
        get_account_tx(conn, account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {account_id}")))
    }

    pub async fn record_stock_trade(
        &self,
        account_id: i64,
        input: StockTradeInput,
    ) -> Result<StockTradeOutcome, AppError> {
        let mut tx = self.repo.pool().begin().await?;
        let account = Self::load_account_tx(&mut *tx, account_id).await?;
        let provenance = Provenance {
            external_ref: None,
            fingerprint: Some(stock_fingerprint(account_id, &input)),
            description: None,
        };
        let outcome =
            apply_stock_trade_tx(&mut *tx, &account, &input, &provenance, self.config.oversell_mode)
                .await?;
        tx.commit().await?;

        info!(
            account_id,
            symbol = %input.symbol,
            action = input.action.as_str(),
            quantity = %input.quantity,
            "Recorded stock trade"
        );
        Ok(outcome)
    }

    pub async fn record_option_trade(
        &self,
        account_id: i64,
        input: OptionTradeInput,
    ) -> Result<OptionTradeOutcome, AppError> {
        let mut tx = self.repo.pool().begin().await?;
        let account = Self::load_account_tx(&mut *tx, account_id).await?;
        let provenance = Provenance {
            external_ref: None,
            fingerprint: Some(option_fingerprint(account_id, &input)),
            description: None,
        };
        let outcome = apply_option_trade_tx(
            &mut *tx,
            &account,
            &input,
            &provenance,
            self.config.reinvest_grace_hours,
        )
        .await?;
        tx.commit().await?;

        info!(
            account_id,
            symbol = %input.symbol,
            action = input.action.as_str(),
            instance_id = outcome.instance_id,
            finalized = outcome.finalized,
            "Recorded option trade"
        );
        Ok(outcome)
    }

    /// Deposits always raise free cash; they are how onboarding seeds the
    /// account, so the gate does not apply.
    pub async fn record_deposit(
        &self,
        account_id: i64,
        amount: Decimal,
        occurred_at: TimeMs,
        description: Option<String>,
    ) -> Result<i64, AppError> {
        if !amount.is_positive() {
            return Err(AppError::Validation(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }

        let mut tx = self.repo.pool().begin().await?;
        let account = Self::load_account_tx(&mut *tx, account_id).await?;
        let entry_id = insert_entry_tx(
            &mut *tx,
            &NewLedgerEntry {
                account_id: account.id,
                underlying_id: None,
                kind: EntryKind::CashDeposit,
                amount,
                occurred_at,
                instance_id: None,
                external_ref: None,
                fingerprint: None,
                description,
                is_closing: false,
            },
        )
        .await?;
        adjust_free_cash_tx(&mut *tx, account.id, amount).await?;
        tx.commit().await?;

        info!(account_id, amount = %amount, "Recorded cash deposit");
        Ok(entry_id)
    }
}
