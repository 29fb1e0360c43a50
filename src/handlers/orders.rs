use crate::checkout::{self, CheckoutRequest};
use crate::errors::AppError;
use crate::events::{order_updates, OrderEvent};
use crate::models::{Order, PaymentMethod};
use crate::orders::{self, PaymentOutcome, TrackingView};
use crate::payments::{confirmation_url, secret_matches};
use crate::state::AppState;
use crate::ui::render_order;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html,
    },
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use tracing::warn;
use uuid::Uuid;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub redirect_url: String,
}

pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let order = {
        let mut data = state.data.lock().await;
        let order = checkout::place_order(&mut data, request, Utc::now())?;
        state.persist(&data).await?;
        order
    };
    state.events.publish(&order);

    if order.payment_method == PaymentMethod::Cash {
        let redirect_url = confirmation_url(&state.config.public_base_url, order.id);
        return Ok((StatusCode::CREATED, Json(CheckoutResponse { order, redirect_url })));
    }

    // The gateway call happens without the store lock held.
    match state.gateway.create_session(&order).await {
        Ok(session) => {
            let mut data = state.data.lock().await;
            let stored = data
                .orders
                .get_mut(&order.id)
                .ok_or_else(|| AppError::not_found(format!("order {} not found", order.id)))?;
            stored.payment_session_id = Some(session.id);
            let order = stored.clone();
            state.persist(&data).await?;
            Ok((
                StatusCode::CREATED,
                Json(CheckoutResponse {
                    order,
                    redirect_url: session.redirect_url,
                }),
            ))
        }
        Err(err) => {
            warn!(order_id = %order.id, "payment session failed: {err}");
            let failed = {
                let mut data = state.data.lock().await;
                let failed = orders::abandon_payment(&mut data, order.id, Utc::now())?;
                state.persist(&data).await?;
                failed
            };
            state.events.publish(&failed);
            Err(err.into())
        }
    }
}

/// Fails timed-out card payments before anyone reads the order.
async fn load_tracked(state: &AppState, order_id: Uuid) -> Result<TrackingView, AppError> {
    let now = Utc::now();
    let window = state.config.payment_window;
    let mut data = state.data.lock().await;
    let order = data
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::not_found(format!("order {order_id} not found")))?;

    if orders::payment_timed_out(order, window, now) {
        let expired = orders::expire_stale_payments(&mut data, window, now);
        state.persist(&data).await?;
        for id in expired {
            if let Some(order) = data.orders.get(&id) {
                state.events.publish(order);
            }
        }
    }

    let order = data
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::not_found(format!("order {order_id} not found")))?;
    Ok(orders::tracking_view(order, window, now))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<TrackingView>, AppError> {
    Ok(Json(load_tracked(&state, order_id).await?))
}

pub async fn order_page(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let view = load_tracked(&state, order_id).await?;
    Ok(Html(render_order(&view.order)))
}

fn status_event(event: &OrderEvent) -> Result<Event, axum::Error> {
    Event::default().event("order_status").json_data(event)
}

/// Live status feed for one order. The current state is sent first so a
/// client never misses a change that happened before it subscribed.
pub async fn order_events(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let receiver = state.events.subscribe();
    let current = {
        let data = state.data.lock().await;
        let order = data
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::not_found(format!("order {order_id} not found")))?;
        OrderEvent::from(order)
    };

    let updates = order_updates(state.data.clone(), receiver, order_id).map(|event| status_event(&event));
    let stream = tokio_stream::once(status_event(&current)).chain(updates);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Json<Vec<Order>> {
    let data = state.data.lock().await;
    let mut history: Vec<Order> = data
        .orders
        .values()
        .filter(|order| order.customer_id.as_deref() == Some(customer_id.as_str()))
        .cloned()
        .collect();
    history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(history)
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub session_id: String,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub order_id: Option<Uuid>,
    pub applied: bool,
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<WebhookResponse>, AppError> {
    if let Some(expected) = &state.config.payment_webhook_secret {
        let provided = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !secret_matches(expected, provided) {
            warn!("payment webhook rejected: bad secret");
            return Err(AppError::unauthorized("invalid webhook secret"));
        }
    }

    let resolved = {
        let mut data = state.data.lock().await;
        let resolved =
            orders::resolve_payment(&mut data, &payload.session_id, payload.outcome, Utc::now())?;
        if resolved.is_some() {
            state.persist(&data).await?;
        }
        resolved
    };

    Ok(Json(match resolved {
        Some(order) => {
            state.events.publish(&order);
            WebhookResponse {
                order_id: Some(order.id),
                applied: true,
            }
        }
        None => WebhookResponse {
            order_id: None,
            applied: false,
        },
    }))
}

/// Periodic pass over unpaid card orders; runs from a background task.
pub async fn sweep_stale_payments(state: &AppState) -> Result<usize, AppError> {
    let mut data = state.data.lock().await;
    let expired = orders::expire_stale_payments(&mut data, state.config.payment_window, Utc::now());
    if expired.is_empty() {
        return Ok(0);
    }
    state.persist(&data).await?;
    for id in &expired {
        if let Some(order) = data.orders.get(id) {
            state.events.publish(order);
        }
    }
    Ok(expired.len())
}
