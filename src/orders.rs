//! Status changes on stored orders and their side effects on loyalty.

use crate::loyalty;
use crate::models::{Order, PaymentMethod, StoreData};
use crate::status::{
    check_operator_transition, check_transition, pickup_progress, OrderStatus, PaymentStatus,
    PickupProgress, TransitionError, PICKUP_STEPS,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(Uuid),
    #[error("unknown payment session {0}")]
    UnknownSession(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Cancelled,
}

/// Moves an order to `to`, stamping the transition time. An unpaid order
/// that is cancelled or failed takes its payment down with it.
pub fn apply_status(
    order: &mut Order,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    check_transition(order.fulfillment, order.status, to)?;
    order.status = to;
    order.timestamps.stamp(to, now);
    order.updated_at = now;
    if order.payment_status == PaymentStatus::Pending {
        match to {
            OrderStatus::Cancelled => order.payment_status = PaymentStatus::Cancelled,
            OrderStatus::Failed => order.payment_status = PaymentStatus::Failed,
            _ => {}
        }
    }
    Ok(())
}

/// Post-transition bookkeeping: points on delivery; coupon and promo use
/// handed back on a failed or cancelled order.
fn settle(data: &mut StoreData, order_id: Uuid, now: DateTime<Utc>) {
    let Some((status, coupon_id, promo_code)) = data
        .orders
        .get(&order_id)
        .map(|order| (order.status, order.coupon_id, order.promo_code.clone()))
    else {
        return;
    };
    match status {
        OrderStatus::Delivered => {
            loyalty::award_order(data, order_id, now);
        }
        OrderStatus::Cancelled | OrderStatus::Failed => {
            if let Some(coupon) = coupon_id.and_then(|id| data.coupons.get_mut(&id)) {
                if loyalty::restore(coupon, now) {
                    info!(%order_id, coupon_id = %coupon.id, "coupon returned to customer");
                }
            }
            if let Some(promo) = promo_code.and_then(|code| data.promo_codes.get_mut(&code)) {
                promo.uses = promo.uses.saturating_sub(1);
            }
        }
        _ => {}
    }
}

/// Applies a staff-initiated transition from the operator dashboard.
pub fn operator_update(
    data: &mut StoreData,
    order_id: Uuid,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> Result<Order, OrderError> {
    let order = data
        .orders
        .get_mut(&order_id)
        .ok_or(OrderError::NotFound(order_id))?;
    check_operator_transition(order.fulfillment, order.status, to)?;
    let from = order.status;
    apply_status(order, to, now)?;
    info!(%order_id, number = order.number, %from, %to, "order status updated");

    settle(data, order_id, now);
    data.orders
        .get(&order_id)
        .cloned()
        .ok_or(OrderError::NotFound(order_id))
}

/// Records the gateway's verdict on a payment session. Returns `None` when
/// the session was already resolved.
pub fn resolve_payment(
    data: &mut StoreData,
    session_id: &str,
    outcome: PaymentOutcome,
    now: DateTime<Utc>,
) -> Result<Option<Order>, OrderError> {
    let order = data
        .orders
        .values_mut()
        .find(|order| order.payment_session_id.as_deref() == Some(session_id))
        .ok_or_else(|| OrderError::UnknownSession(session_id.to_string()))?;

    let order_id = order.id;
    if order.payment_status != PaymentStatus::Pending {
        if outcome == PaymentOutcome::Paid && order.payment_status != PaymentStatus::Paid {
            warn!(%order_id, status = %order.status, "payment captured for a closed order, refund required");
        } else {
            info!(session_id, "payment session already resolved");
        }
        return Ok(None);
    }

    let (payment_status, next) = match outcome {
        PaymentOutcome::Paid => (PaymentStatus::Paid, OrderStatus::Confirmed),
        PaymentOutcome::Failed => (PaymentStatus::Failed, OrderStatus::Failed),
        PaymentOutcome::Cancelled => (PaymentStatus::Cancelled, OrderStatus::Cancelled),
    };
    apply_status(order, next, now)?;
    order.payment_status = payment_status;
    info!(%order_id, ?outcome, "payment resolved");

    settle(data, order_id, now);
    Ok(data.orders.get(&order_id).cloned())
}

/// Gives up on an order whose payment session could not be registered.
pub fn abandon_payment(
    data: &mut StoreData,
    order_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Order, OrderError> {
    let order = data
        .orders
        .get_mut(&order_id)
        .ok_or(OrderError::NotFound(order_id))?;
    apply_status(order, OrderStatus::Failed, now)?;
    warn!(%order_id, number = order.number, "payment session could not be created");
    settle(data, order_id, now);
    data.orders
        .get(&order_id)
        .cloned()
        .ok_or(OrderError::NotFound(order_id))
}

pub fn payment_timed_out(order: &Order, window: Duration, now: DateTime<Utc>) -> bool {
    order.payment_method == PaymentMethod::Card
        && order.status == OrderStatus::PendingPayment
        && order.payment_status == PaymentStatus::Pending
        && now - order.created_at >= window
}

/// Fails card orders whose payment never arrived. Returns the ids touched.
pub fn expire_stale_payments(
    data: &mut StoreData,
    window: Duration,
    now: DateTime<Utc>,
) -> Vec<Uuid> {
    let stale: Vec<Uuid> = data
        .orders
        .values()
        .filter(|order| payment_timed_out(order, window, now))
        .map(|order| order.id)
        .collect();

    for order_id in &stale {
        if let Some(order) = data.orders.get_mut(order_id) {
            if apply_status(order, OrderStatus::Failed, now).is_ok() {
                warn!(%order_id, number = order.number, "payment window elapsed, order failed");
            }
        }
        settle(data, *order_id, now);
    }
    stale
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub order: Order,
    pub progress: PickupProgress,
    pub steps: [&'static str; 4],
    pub payment_timed_out: bool,
}

pub fn tracking_view(order: &Order, window: Duration, now: DateTime<Utc>) -> TrackingView {
    TrackingView {
        progress: pickup_progress(order.status, order.payment_status),
        steps: PICKUP_STEPS,
        payment_timed_out: payment_timed_out(order, window, now)
            || (order.status == OrderStatus::Failed
                && order.payment_status == PaymentStatus::Failed
                && order.timestamps.failed_at.is_some_and(|failed| {
                    failed - order.created_at >= window
                })),
        order: order.clone(),
    }
}

/// Orders the operator dashboard still has to act on, oldest first.
pub fn queue(data: &StoreData, filter: Option<OrderStatus>) -> Vec<Order> {
    let mut orders: Vec<Order> = data
        .orders
        .values()
        .filter(|order| match filter {
            Some(status) => order.status == status,
            None => !order.status.is_terminal() && order.status != OrderStatus::PendingPayment,
        })
        .cloned()
        .collect();
    orders.sort_by_key(|order| (order.status, order.created_at));
    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Contact, Coupon, CouponStatus, Discount, PromoCode, StatusTimestamps, Totals,
    };
    use crate::status::{Fulfillment, TerminalReason};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 18, 30, 0).unwrap()
    }

    fn order(method: PaymentMethod, fulfillment: Fulfillment) -> Order {
        let (status, payment_status) = match method {
            PaymentMethod::Card => (OrderStatus::PendingPayment, PaymentStatus::Pending),
            PaymentMethod::Cash => (OrderStatus::Confirmed, PaymentStatus::PayOnSite),
        };
        Order {
            id: Uuid::new_v4(),
            number: 1001,
            location_id: Uuid::new_v4(),
            customer_id: Some("cust-1".into()),
            fulfillment,
            contact: Contact {
                name: "Ana".into(),
                phone: "555-0100".into(),
                email: None,
            },
            delivery_address: None,
            payment_method: method,
            payment_status,
            payment_session_id: Some("sess_1".into()),
            status,
            items: Vec::new(),
            totals: Totals {
                subtotal_cents: 2550,
                discount_cents: 0,
                delivery_fee_cents: 0,
                tax_cents: 0,
                tip_cents: 0,
                total_cents: 2550,
            },
            promo_code: None,
            coupon_id: None,
            points_awarded: 0,
            timestamps: StatusTimestamps::default(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn store_with(order: Order) -> (StoreData, Uuid) {
        let mut data = StoreData::default();
        let id = order.id;
        data.orders.insert(id, order);
        (data, id)
    }

    #[test]
    fn paid_session_confirms_the_order() {
        let (mut data, id) = store_with(order(PaymentMethod::Card, Fulfillment::Pickup));
        let updated = resolve_payment(&mut data, "sess_1", PaymentOutcome::Paid, now())
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert_eq!(updated.timestamps.confirmed_at, Some(now()));

        let again = resolve_payment(&mut data, "sess_1", PaymentOutcome::Failed, now()).unwrap();
        assert!(again.is_none());
        assert_eq!(data.orders[&id].status, OrderStatus::Confirmed);
    }

    #[test]
    fn unknown_session_is_reported() {
        let (mut data, _) = store_with(order(PaymentMethod::Card, Fulfillment::Pickup));
        assert!(matches!(
            resolve_payment(&mut data, "nope", PaymentOutcome::Paid, now()),
            Err(OrderError::UnknownSession(session)) if session == "nope"
        ));
    }

    #[test]
    fn rejected_transition_leaves_payment_pending() {
        let mut stuck = order(PaymentMethod::Card, Fulfillment::Pickup);
        stuck.status = OrderStatus::Delivered;
        let (mut data, id) = store_with(stuck);
        assert!(matches!(
            resolve_payment(&mut data, "sess_1", PaymentOutcome::Paid, now()),
            Err(OrderError::Transition(TransitionError::Finished(OrderStatus::Delivered)))
        ));
        assert_eq!(data.orders[&id].payment_status, PaymentStatus::Pending);
        assert_eq!(data.orders[&id].status, OrderStatus::Delivered);
    }

    #[test]
    fn full_pickup_lifecycle_awards_points_once() {
        let (mut data, id) = store_with(order(PaymentMethod::Cash, Fulfillment::Pickup));
        for status in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Delivered] {
            operator_update(&mut data, id, status, now()).unwrap();
        }
        let order = &data.orders[&id];
        assert_eq!(order.points_awarded, 25);
        assert!(order.timestamps.ready_at.is_some());
        assert!(order.timestamps.delivered_at.is_some());
        assert_eq!(data.loyalty_accounts["cust-1"].lifetime_points, 25);

        assert!(matches!(
            operator_update(&mut data, id, OrderStatus::Cancelled, now()),
            Err(OrderError::Transition(TransitionError::Finished(OrderStatus::Delivered)))
        ));
        assert_eq!(data.loyalty_accounts["cust-1"].balance, 25);
    }

    #[test]
    fn operator_cannot_confirm_unpaid_order() {
        let (mut data, id) = store_with(order(PaymentMethod::Card, Fulfillment::Pickup));
        assert!(matches!(
            operator_update(&mut data, id, OrderStatus::Confirmed, now()),
            Err(OrderError::Transition(TransitionError::PaymentOnly { .. }))
        ));
        let cancelled = operator_update(&mut data, id, OrderStatus::Cancelled, now()).unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
        assert_eq!(
            pickup_progress(cancelled.status, cancelled.payment_status),
            PickupProgress::Terminal(TerminalReason::PaymentCancelled)
        );
    }

    #[test]
    fn cancellation_returns_the_coupon() {
        let mut placed = order(PaymentMethod::Cash, Fulfillment::Delivery);
        let coupon = Coupon {
            id: Uuid::new_v4(),
            customer_id: "cust-1".into(),
            reward_id: Uuid::new_v4(),
            reward_name: "Free delivery".into(),
            discount: Discount::FreeDelivery,
            status: CouponStatus::Used,
            created_at: now(),
            expires_at: now() + Duration::days(30),
            used_at: Some(now()),
            order_id: Some(placed.id),
        };
        placed.coupon_id = Some(coupon.id);
        let (mut data, id) = store_with(placed);
        data.coupons.insert(coupon.id, coupon.clone());

        operator_update(&mut data, id, OrderStatus::Cancelled, now()).unwrap();
        assert_eq!(data.coupons[&coupon.id].status, CouponStatus::Active);
    }

    #[test]
    fn failed_payment_releases_promo_use() {
        let mut placed = order(PaymentMethod::Card, Fulfillment::Pickup);
        placed.promo_code = Some("WELCOME".into());
        let (mut data, _) = store_with(placed);
        data.promo_codes.insert(
            "WELCOME".into(),
            PromoCode {
                code: "WELCOME".into(),
                description: String::new(),
                discount: Discount::AmountOff { cents: 500 },
                min_subtotal_cents: 0,
                max_uses: Some(1),
                uses: 1,
                expires_at: None,
                active: true,
            },
        );

        let failed = resolve_payment(&mut data, "sess_1", PaymentOutcome::Failed, now())
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(data.promo_codes["WELCOME"].uses, 0);
    }

    #[test]
    fn abandoned_payment_fails_the_order() {
        let (mut data, id) = store_with(order(PaymentMethod::Card, Fulfillment::Pickup));
        let order = abandon_payment(&mut data, id, now()).unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert_eq!(order.timestamps.failed_at, Some(now()));
    }

    #[test]
    fn stale_card_payments_fail_after_window() {
        let (mut data, id) = store_with(order(PaymentMethod::Card, Fulfillment::Pickup));
        let window = Duration::minutes(15);
        assert!(expire_stale_payments(&mut data, window, now() + Duration::minutes(14)).is_empty());

        let later = now() + Duration::minutes(15);
        assert_eq!(expire_stale_payments(&mut data, window, later), vec![id]);
        let order = &data.orders[&id];
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert!(tracking_view(order, window, later).payment_timed_out);
    }

    #[test]
    fn queue_hides_unpaid_and_finished_orders() {
        let (mut data, paid_id) = store_with(order(PaymentMethod::Cash, Fulfillment::Pickup));
        let unpaid = order(PaymentMethod::Card, Fulfillment::Pickup);
        data.orders.insert(unpaid.id, unpaid);

        let queued = queue(&data, None);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, paid_id);
        assert_eq!(queue(&data, Some(OrderStatus::PendingPayment)).len(), 1);
    }
}
