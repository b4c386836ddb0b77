use axum::extract::{Path, State};
use axum::Json;
use futures::future::try_join_all;
use serde::Serialize;

use crate::api::AppState;
use crate::domain::{Decimal, InstanceStatus, StockLot, StrategyInstance, Symbol};
use crate::error::AppError;

/// One underlying's aggregated open share position.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub underlying_id: i64,
    pub symbol: Symbol,
    pub shares: Decimal,
    /// Open cost basis after accumulated premium reductions.
    pub adjusted_basis: Decimal,
    pub current_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_gain: Option<Decimal>,
    pub lots: Vec<StockLot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub free_cash: Decimal,
    pub cashflow_reserve: Decimal,
    pub positions: Vec<Position>,
    pub open_instances: Vec<StrategyInstance>,
}

/// Open lots grouped by underlying, plus open option instances.
pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PortfolioResponse>, AppError> {
    let account = state
        .repo
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {id}")))?;

    let position_futures = state.repo.list_underlyings(id).await?.into_iter().map(
        |underlying| {
            let state = state.clone();
            async move {
                let lots = state
                    .repo
                    .list_open_lots_for_underlying(underlying.id)
                    .await?;
                if lots.is_empty() {
                    return Ok::<_, AppError>(None);
                }
                let shares: Decimal = lots.iter().map(|l| l.remaining).sum();
                let adjusted_basis: Decimal =
                    lots.iter().map(|l| l.adjusted_open_basis()).sum();
                let market_value = underlying.current_price.map(|price| price * shares);
                let unrealized_gain = market_value.map(|mv| mv - adjusted_basis);
                Ok(Some(Position {
                    underlying_id: underlying.id,
                    symbol: underlying.symbol,
                    shares,
                    adjusted_basis,
                    current_price: underlying.current_price,
                    market_value,
                    unrealized_gain,
                    lots,
                }))
            }
        },
    );
    let positions: Vec<Position> = try_join_all(position_futures)
        .await?
        .into_iter()
        .flatten()
        .collect();

    let open_instances = state
        .repo
        .list_instances(id, Some(InstanceStatus::Open))
        .await?;

    Ok(Json(PortfolioResponse {
        free_cash: account.free_cash,
        cashflow_reserve: account.cashflow_reserve,
        positions,
        open_instances,
    }))
}
