//! Order lifecycle.
//!
//! Orders move forward only: `pending_payment → confirmed → preparing → ready`,
//! then pickup orders go straight to `delivered` while delivery orders pass
//! through `awaiting_courier` and/or `in_delivery`. `cancelled` and `failed`
//! branch off the early states. Customers see a fixed four-step pickup
//! progression derived from the order and payment status.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Confirmed,
    Preparing,
    Ready,
    AwaitingCourier,
    InDelivery,
    Delivered,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::PendingPayment,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::AwaitingCourier,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::AwaitingCourier => "awaiting_courier",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// Cash orders: settled at the counter or on delivery.
    PayOnSite,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_resolved(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    Pickup,
    Delivery,
}

impl fmt::Display for Fulfillment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Fulfillment::Pickup => "pickup",
            Fulfillment::Delivery => "delivery",
        })
    }
}

pub const PICKUP_STEPS: [&str; 4] = ["accepted", "paid", "preparing", "ready"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    PaymentFailed,
    PaymentCancelled,
    OrderCancelled,
    OrderFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PickupProgress {
    /// Zero-based index into [`PICKUP_STEPS`].
    Step(usize),
    Terminal(TerminalReason),
}

/// Maps an order to its place in the pickup progression.
///
/// A failed or cancelled payment ends tracking outright. While the payment is
/// still pending the order reports the first step whatever its status says.
pub fn pickup_progress(status: OrderStatus, payment: PaymentStatus) -> PickupProgress {
    use OrderStatus::*;

    match (payment, status) {
        (PaymentStatus::Failed, _) => PickupProgress::Terminal(TerminalReason::PaymentFailed),
        (PaymentStatus::Cancelled, _) => {
            PickupProgress::Terminal(TerminalReason::PaymentCancelled)
        }
        (PaymentStatus::Pending, _) => PickupProgress::Step(0),
        (_, Cancelled) => PickupProgress::Terminal(TerminalReason::OrderCancelled),
        (_, Failed) => PickupProgress::Terminal(TerminalReason::OrderFailed),
        (_, PendingPayment) => PickupProgress::Step(0),
        (_, Confirmed) => PickupProgress::Step(1),
        (_, Preparing) => PickupProgress::Step(2),
        (_, Ready | AwaitingCourier | InDelivery | Delivered) => PickupProgress::Step(3),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("order is already {0}")]
    Unchanged(OrderStatus),
    #[error("order is {0} and can no longer change")]
    Finished(OrderStatus),
    #[error("a {fulfillment} order cannot move from {from} to {to}")]
    NotAllowed {
        fulfillment: Fulfillment,
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error("only the payment provider can move an order from {from} to {to}")]
    PaymentOnly { from: OrderStatus, to: OrderStatus },
}

pub fn can_transition(fulfillment: Fulfillment, from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    match (from, to) {
        (PendingPayment, Confirmed | Failed | Cancelled) => true,
        (Confirmed, Preparing | Cancelled) => true,
        (Preparing, Ready | Cancelled) => true,
        (Ready, Cancelled) => true,
        (Ready, Delivered) => fulfillment == Fulfillment::Pickup,
        (Ready, AwaitingCourier | InDelivery) => fulfillment == Fulfillment::Delivery,
        (AwaitingCourier, InDelivery | Cancelled) => true,
        (InDelivery, Delivered) => true,
        _ => false,
    }
}

pub fn check_transition(
    fulfillment: Fulfillment,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), TransitionError> {
    if from == to {
        return Err(TransitionError::Unchanged(from));
    }
    if from.is_terminal() {
        return Err(TransitionError::Finished(from));
    }
    if !can_transition(fulfillment, from, to) {
        return Err(TransitionError::NotAllowed {
            fulfillment,
            from,
            to,
        });
    }
    Ok(())
}

/// Operators may cancel an unpaid order but never confirm or fail it; that
/// is left to the payment outcome.
pub fn check_operator_transition(
    fulfillment: Fulfillment,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), TransitionError> {
    check_transition(fulfillment, from, to)?;
    if from == OrderStatus::PendingPayment && to != OrderStatus::Cancelled {
        return Err(TransitionError::PaymentOnly { from, to });
    }
    Ok(())
}
