//! Turning a cart into a stored order.

use crate::cart::{self, Cart, CartError, Quote};
use crate::loyalty::{self, LoyaltyError};
use crate::models::{
    Contact, Discount, Location, Order, PaymentMethod, StatusTimestamps, StoreData,
};
use crate::status::{Fulfillment, OrderStatus, PaymentStatus};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("unknown location {0}")]
    UnknownLocation(Uuid),
    #[error("{0} is not taking orders")]
    LocationInactive(String),
    #[error("{location} does not offer {fulfillment}")]
    FulfillmentUnavailable {
        location: String,
        fulfillment: Fulfillment,
    },
    #[error("{0} is closed right now")]
    Closed(String),
    #[error("contact {0} is required")]
    MissingContact(&'static str),
    #[error("a delivery address is required")]
    MissingAddress,
    #[error("delivery needs a subtotal of at least {minimum_cents} cents")]
    BelowDeliveryMinimum { minimum_cents: u64 },
    #[error("unknown promo code {0}")]
    UnknownPromo(String),
    #[error("loyalty coupons need a signed-in customer")]
    CouponNeedsCustomer,
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub location_id: Uuid,
    pub fulfillment: Fulfillment,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub cart: Cart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub location_id: Uuid,
    pub fulfillment: Fulfillment,
    pub contact: Contact,
    #[serde(default)]
    pub delivery_address: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub cart: Cart,
}

fn usable_location(
    data: &StoreData,
    location_id: Uuid,
    fulfillment: Fulfillment,
) -> Result<&Location, CheckoutError> {
    let location = data
        .locations
        .get(&location_id)
        .ok_or(CheckoutError::UnknownLocation(location_id))?;
    if !location.active {
        return Err(CheckoutError::LocationInactive(location.name.clone()));
    }
    if !location.offers(fulfillment) {
        return Err(CheckoutError::FulfillmentUnavailable {
            location: location.name.clone(),
            fulfillment,
        });
    }
    Ok(location)
}

/// Picks the promo code or loyalty coupon named by the cart, checking it
/// against the subtotal. Never both.
fn resolve_discount(
    data: &StoreData,
    cart: &Cart,
    customer_id: Option<&str>,
    subtotal_cents: u64,
    now: DateTime<Utc>,
) -> Result<Option<Discount>, CheckoutError> {
    match (&cart.promo_code, cart.coupon_id) {
        (Some(_), Some(_)) => Err(CartError::PromoAndCoupon.into()),
        (Some(code), None) => {
            let code = cart::normalize_code(code);
            let promo = data
                .promo_codes
                .get(&code)
                .ok_or(CheckoutError::UnknownPromo(code))?;
            cart::check_promo(promo, subtotal_cents, now)?;
            Ok(Some(promo.discount))
        }
        (None, Some(coupon_id)) => {
            let customer_id = customer_id.ok_or(CheckoutError::CouponNeedsCustomer)?;
            let coupon = data
                .coupons
                .get(&coupon_id)
                .ok_or(LoyaltyError::UnknownCoupon(coupon_id))?;
            loyalty::check_usable(coupon, customer_id, now)?;
            Ok(Some(coupon.discount))
        }
        (None, None) => Ok(None),
    }
}

/// Prices a cart without placing it.
pub fn quote(
    data: &StoreData,
    request: &QuoteRequest,
    now: DateTime<Utc>,
) -> Result<Quote, CheckoutError> {
    let location = usable_location(data, request.location_id, request.fulfillment)?;
    let items = cart::price_lines(&request.cart, &data.menu)?;
    let subtotal = items.iter().map(|item| item.line_total_cents).sum();
    let discount = resolve_discount(
        data,
        &request.cart,
        request.customer_id.as_deref(),
        subtotal,
        now,
    )?;
    let totals = cart::compute_totals(
        subtotal,
        discount.as_ref(),
        location,
        request.fulfillment,
        request.cart.tip_cents,
    );
    Ok(Quote { items, totals })
}

fn trimmed(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Validates and writes the order. Card orders wait for payment; cash orders
/// are confirmed straight away.
pub fn place_order(
    data: &mut StoreData,
    request: CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<Order, CheckoutError> {
    let name = trimmed(&request.contact.name).ok_or(CheckoutError::MissingContact("name"))?;
    let phone = trimmed(&request.contact.phone).ok_or(CheckoutError::MissingContact("phone"))?;
    let email = request.contact.email.as_deref().and_then(trimmed);
    let delivery_address = match request.fulfillment {
        Fulfillment::Delivery => Some(
            request
                .delivery_address
                .as_deref()
                .and_then(trimmed)
                .ok_or(CheckoutError::MissingAddress)?,
        ),
        Fulfillment::Pickup => None,
    };
    let customer_id = request.customer_id.as_deref().and_then(trimmed);

    let location = usable_location(data, request.location_id, request.fulfillment)?;
    if !location.is_open_at(now.with_timezone(&Local).naive_local()) {
        return Err(CheckoutError::Closed(location.name.clone()));
    }

    let priced = quote(
        data,
        &QuoteRequest {
            location_id: request.location_id,
            fulfillment: request.fulfillment,
            customer_id: customer_id.clone(),
            cart: request.cart.clone(),
        },
        now,
    )?;
    if request.fulfillment == Fulfillment::Delivery
        && priced.totals.subtotal_cents < location.delivery_min_subtotal_cents
    {
        return Err(CheckoutError::BelowDeliveryMinimum {
            minimum_cents: location.delivery_min_subtotal_cents,
        });
    }

    let order_id = Uuid::new_v4();
    let promo_code = request.cart.promo_code.as_deref().map(cart::normalize_code);
    if let Some(code) = &promo_code {
        if let Some(promo) = data.promo_codes.get_mut(code) {
            promo.uses = promo.uses.saturating_add(1);
        }
    }
    if let (Some(coupon_id), Some(customer)) = (request.cart.coupon_id, customer_id.as_deref()) {
        let coupon = data
            .coupons
            .get_mut(&coupon_id)
            .ok_or(LoyaltyError::UnknownCoupon(coupon_id))?;
        loyalty::consume(coupon, customer, order_id, now)?;
    }

    let (status, payment_status) = match request.payment_method {
        PaymentMethod::Card => (OrderStatus::PendingPayment, PaymentStatus::Pending),
        PaymentMethod::Cash => (OrderStatus::Confirmed, PaymentStatus::PayOnSite),
    };
    let mut timestamps = StatusTimestamps::default();
    timestamps.stamp(status, now);

    let order = Order {
        id: order_id,
        number: data.take_order_number(),
        location_id: request.location_id,
        customer_id,
        fulfillment: request.fulfillment,
        contact: Contact { name, phone, email },
        delivery_address,
        payment_method: request.payment_method,
        payment_status,
        payment_session_id: None,
        status,
        items: priced.items,
        totals: priced.totals,
        promo_code,
        coupon_id: request.cart.coupon_id,
        points_awarded: 0,
        timestamps,
        created_at: now,
        updated_at: now,
    };
    data.orders.insert(order.id, order.clone());
    info!(
        order_id = %order.id,
        number = order.number,
        fulfillment = %order.fulfillment,
        total_cents = order.totals.total_cents,
        "order placed"
    );
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartLine;
    use crate::models::{
        Coupon, CouponStatus, MenuItem, OpeningHours, PromoCode,
    };
    use chrono::{Duration, NaiveTime, Weekday};

    fn all_week() -> Vec<OpeningHours> {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .map(|weekday| OpeningHours {
            weekday,
            open: midnight,
            close: midnight,
        })
        .collect()
    }

    struct Fixture {
        data: StoreData,
        location_id: Uuid,
        item_id: Uuid,
    }

    fn fixture() -> Fixture {
        let mut data = StoreData::default();
        let location = Location {
            id: Uuid::new_v4(),
            name: "Downtown".into(),
            address: "1 Main St".into(),
            hours: all_week(),
            delivery_fee_cents: 399,
            delivery_min_subtotal_cents: 2000,
            tax_rate_bps: 0,
            pickup_enabled: true,
            delivery_enabled: true,
            active: true,
        };
        let item = MenuItem {
            id: Uuid::new_v4(),
            category: "Bowls".into(),
            name: "Bibimbap".into(),
            description: String::new(),
            price_cents: 1400,
            variants: Vec::new(),
            add_ons: Vec::new(),
            spicy: false,
            image_url: None,
            sort_order: 0,
            available: true,
        };
        let (location_id, item_id) = (location.id, item.id);
        data.locations.insert(location_id, location);
        data.menu.insert(item_id, item);
        Fixture {
            data,
            location_id,
            item_id,
        }
    }

    fn request(fx: &Fixture, quantity: u32, method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            location_id: fx.location_id,
            fulfillment: Fulfillment::Pickup,
            contact: Contact {
                name: " Ana ".into(),
                phone: "555-0100".into(),
                email: Some(String::new()),
            },
            delivery_address: None,
            payment_method: method,
            customer_id: Some("cust-1".into()),
            cart: Cart {
                lines: vec![CartLine {
                    menu_item_id: fx.item_id,
                    variant_id: None,
                    add_on_ids: Vec::new(),
                    spice_level: None,
                    quantity,
                    note: None,
                }],
                tip_cents: 200,
                promo_code: None,
                coupon_id: None,
            },
        }
    }

    #[test]
    fn card_order_waits_for_payment() {
        let mut fx = fixture();
        let req = request(&fx, 2, PaymentMethod::Card);
        let order = place_order(&mut fx.data, req, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.contact.name, "Ana");
        assert_eq!(order.contact.email, None);
        assert_eq!(order.totals.total_cents, 2800 + 200);
        assert_eq!(order.number, 1001);
        assert!(fx.data.orders.contains_key(&order.id));
    }

    #[test]
    fn cash_order_is_confirmed_immediately() {
        let mut fx = fixture();
        let req = request(&fx, 1, PaymentMethod::Cash);
        let order = place_order(&mut fx.data, req, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::PayOnSite);
        assert!(order.timestamps.confirmed_at.is_some());
    }

    #[test]
    fn delivery_needs_address_and_minimum() {
        let mut fx = fixture();
        let mut req = request(&fx, 1, PaymentMethod::Card);
        req.fulfillment = Fulfillment::Delivery;
        assert_eq!(
            place_order(&mut fx.data, req.clone(), Utc::now()).unwrap_err(),
            CheckoutError::MissingAddress
        );
        req.delivery_address = Some("9 Elm St".into());
        assert_eq!(
            place_order(&mut fx.data, req, Utc::now()).unwrap_err(),
            CheckoutError::BelowDeliveryMinimum {
                minimum_cents: 2000
            }
        );
    }

    #[test]
    fn closed_location_rejects_orders() {
        let mut fx = fixture();
        fx.data
            .locations
            .get_mut(&fx.location_id)
            .unwrap()
            .hours
            .clear();
        let req = request(&fx, 1, PaymentMethod::Card);
        assert_eq!(
            place_order(&mut fx.data, req, Utc::now()).unwrap_err(),
            CheckoutError::Closed("Downtown".into())
        );
    }

    #[test]
    fn promo_code_is_applied_and_counted() {
        let mut fx = fixture();
        fx.data.promo_codes.insert(
            "WELCOME".into(),
            PromoCode {
                code: "WELCOME".into(),
                description: String::new(),
                discount: Discount::PercentOff { percent: 50 },
                min_subtotal_cents: 0,
                max_uses: Some(1),
                uses: 0,
                expires_at: None,
                active: true,
            },
        );
        let mut req = request(&fx, 2, PaymentMethod::Cash);
        req.cart.promo_code = Some("welcome".into());
        let order = place_order(&mut fx.data, req.clone(), Utc::now()).unwrap();
        assert_eq!(order.totals.discount_cents, 1400);
        assert_eq!(order.promo_code.as_deref(), Some("WELCOME"));
        assert_eq!(fx.data.promo_codes["WELCOME"].uses, 1);

        assert_eq!(
            place_order(&mut fx.data, req, Utc::now()).unwrap_err(),
            CheckoutError::Cart(CartError::PromoExhausted("WELCOME".into()))
        );
    }

    #[test]
    fn coupon_is_consumed_by_the_order() {
        let mut fx = fixture();
        let now = Utc::now();
        let coupon = Coupon {
            id: Uuid::new_v4(),
            customer_id: "cust-1".into(),
            reward_id: Uuid::new_v4(),
            reward_name: "$5 off".into(),
            discount: Discount::AmountOff { cents: 500 },
            status: CouponStatus::Active,
            created_at: now,
            expires_at: now + Duration::days(30),
            used_at: None,
            order_id: None,
        };
        fx.data.coupons.insert(coupon.id, coupon.clone());

        let mut req = request(&fx, 1, PaymentMethod::Cash);
        req.cart.coupon_id = Some(coupon.id);
        let order = place_order(&mut fx.data, req.clone(), now).unwrap();
        assert_eq!(order.totals.discount_cents, 500);
        let stored = &fx.data.coupons[&coupon.id];
        assert_eq!(stored.status, CouponStatus::Used);
        assert_eq!(stored.order_id, Some(order.id));

        assert_eq!(
            place_order(&mut fx.data, req.clone(), now).unwrap_err(),
            CheckoutError::Loyalty(LoyaltyError::CouponUsed)
        );

        req.cart.promo_code = Some("WELCOME".into());
        assert_eq!(
            place_order(&mut fx.data, req, now).unwrap_err(),
            CheckoutError::Cart(CartError::PromoAndCoupon)
        );
    }
}
