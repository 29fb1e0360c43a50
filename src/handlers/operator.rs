use crate::errors::AppError;
use crate::loyalty;
use crate::models::{LoyaltyAccount, Order};
use crate::operator::{bearer_token, OperatorSession};
use crate::orders;
use crate::state::AppState;
use crate::stats::{build_stats, StatsResponse};
use crate::status::OrderStatus;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Extractor that rejects requests without a live operator session.
pub struct OperatorGuard {
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OperatorGuard {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;
        state.auth.authorize(token, Utc::now())?;
        Ok(Self {
            token: token.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub pin: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<OperatorSession>, AppError> {
    let auth = state.auth.clone();
    let session = tokio::task::spawn_blocking(move || auth.login(&request.pin, Utc::now()))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(session))
}

pub async fn logout(State(state): State<AppState>, guard: OperatorGuard) -> StatusCode {
    state.auth.logout(&guard.token);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub status: Option<OrderStatus>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Query(query): Query<QueueQuery>,
) -> Json<BTreeMap<OrderStatus, Vec<Order>>> {
    let data = state.data.lock().await;
    let mut grouped: BTreeMap<OrderStatus, Vec<Order>> = BTreeMap::new();
    for order in orders::queue(&data, query.status) {
        grouped.entry(order.status).or_default().push(order);
    }
    Json(grouped)
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(order_id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    let order = {
        let mut data = state.data.lock().await;
        let order = orders::operator_update(&mut data, order_id, update.status, Utc::now())?;
        state.persist(&data).await?;
        order
    };
    state.events.publish(&order);
    Ok(Json(order))
}

pub async fn get_stats(
    State(state): State<AppState>,
    _guard: OperatorGuard,
) -> Result<Json<StatsResponse>, AppError> {
    let data = state.data.lock().await;
    Ok(Json(build_stats(&data)))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub points: i64,
    #[serde(default)]
    pub note: String,
}

pub async fn adjust_points(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(customer_id): Path<String>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<LoyaltyAccount>, AppError> {
    if request.points == 0 {
        return Err(AppError::bad_request("adjustment must be non-zero"));
    }
    let mut data = state.data.lock().await;
    let account = loyalty::adjust(&mut data, &customer_id, request.points, &request.note, Utc::now())?;
    state.persist(&data).await?;
    Ok(Json(account))
}
