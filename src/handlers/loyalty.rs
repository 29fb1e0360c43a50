use crate::errors::AppError;
use crate::loyalty::{self, LoyaltySummary};
use crate::models::{Coupon, LedgerEntry, Reward};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

pub async fn list_rewards(State(state): State<AppState>) -> Json<Vec<Reward>> {
    let data = state.data.lock().await;
    let mut rewards: Vec<Reward> = data
        .rewards
        .values()
        .filter(|reward| reward.active)
        .cloned()
        .collect();
    rewards.sort_by_key(|reward| reward.cost_points);
    Json(rewards)
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<LoyaltySummary>, AppError> {
    let now = Utc::now();
    let mut data = state.data.lock().await;
    let rules = data.loyalty_rules;
    if loyalty::cleanup(&mut data.coupons, &customer_id, &rules, now) > 0 {
        state.persist(&data).await?;
    }
    Ok(Json(loyalty::summary(&data, &customer_id, now)))
}

/// Newest entries first.
pub async fn get_ledger(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Json<Vec<LedgerEntry>> {
    let data = state.data.lock().await;
    let ledger = data
        .loyalty_accounts
        .get(&customer_id)
        .map(|account| account.ledger.iter().rev().cloned().collect())
        .unwrap_or_default();
    Json(ledger)
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub reward_id: Uuid,
}

pub async fn activate_reward(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Json(request): Json<ActivateRequest>,
) -> Result<(StatusCode, Json<Coupon>), AppError> {
    let mut data = state.data.lock().await;
    let coupon = loyalty::activate(&mut data, &customer_id, request.reward_id, Utc::now())?;
    state.persist(&data).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}
