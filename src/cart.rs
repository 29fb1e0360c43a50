//! Cart pricing against the live menu.

use crate::models::{Discount, Location, MenuItem, OrderItem, PromoCode, SpiceLevel, Totals};
use crate::status::Fulfillment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_LINE_QUANTITY: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub menu_item_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub add_on_ids: Vec<String>,
    #[serde(default)]
    pub spice_level: Option<SpiceLevel>,
    pub quantity: u32,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub tip_cents: u64,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub coupon_id: Option<Uuid>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("unknown menu item {0}")]
    UnknownItem(Uuid),
    #[error("'{0}' is not available right now")]
    Unavailable(String),
    #[error("'{0}' needs a size or variant")]
    VariantRequired(String),
    #[error("'{item}' has no variant '{variant}'")]
    UnknownVariant { item: String, variant: String },
    #[error("'{item}' has no add-on '{add_on}'")]
    UnknownAddOn { item: String, add_on: String },
    #[error("'{0}' does not come with a spice level")]
    SpiceNotOffered(String),
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}, got {0}")]
    InvalidQuantity(u32),
    #[error("a promo code and a loyalty coupon cannot be combined")]
    PromoAndCoupon,
    #[error("promo code {0} is not valid")]
    PromoInvalid(String),
    #[error("promo code {0} has expired")]
    PromoExpired(String),
    #[error("promo code {0} has been fully redeemed")]
    PromoExhausted(String),
    #[error("promo code {code} needs a subtotal of at least {minimum_cents} cents")]
    PromoMinimum { code: String, minimum_cents: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub items: Vec<OrderItem>,
    pub totals: Totals,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn price_line(line: &CartLine, item: &MenuItem) -> Result<OrderItem, CartError> {
    if !item.available {
        return Err(CartError::Unavailable(item.name.clone()));
    }
    if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity(line.quantity));
    }
    if line.spice_level.is_some() && !item.spicy {
        return Err(CartError::SpiceNotOffered(item.name.clone()));
    }

    let (base, variant) = match (&line.variant_id, item.variants.is_empty()) {
        (None, true) => (item.price_cents, None),
        (None, false) => return Err(CartError::VariantRequired(item.name.clone())),
        (Some(wanted), _) => {
            let variant = item
                .variants
                .iter()
                .find(|variant| &variant.id == wanted)
                .ok_or_else(|| CartError::UnknownVariant {
                    item: item.name.clone(),
                    variant: wanted.clone(),
                })?;
            (variant.price_cents, Some(variant.name.clone()))
        }
    };

    let mut unit = base;
    let mut add_ons = Vec::with_capacity(line.add_on_ids.len());
    for wanted in &line.add_on_ids {
        let add_on = item
            .add_ons
            .iter()
            .find(|add_on| &add_on.id == wanted)
            .ok_or_else(|| CartError::UnknownAddOn {
                item: item.name.clone(),
                add_on: wanted.clone(),
            })?;
        unit = unit.saturating_add(add_on.price_cents);
        add_ons.push(add_on.name.clone());
    }

    Ok(OrderItem {
        id: Uuid::new_v4(),
        menu_item_id: item.id,
        name: item.name.clone(),
        variant,
        add_ons,
        spice_level: line.spice_level,
        quantity: line.quantity,
        unit_price_cents: unit,
        line_total_cents: unit.saturating_mul(u64::from(line.quantity)),
        note: line
            .note
            .as_ref()
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty()),
    })
}

/// Resolves every cart line against the menu.
pub fn price_lines(
    cart: &Cart,
    menu: &BTreeMap<Uuid, MenuItem>,
) -> Result<Vec<OrderItem>, CartError> {
    if cart.lines.is_empty() {
        return Err(CartError::Empty);
    }
    cart.lines
        .iter()
        .map(|line| {
            let item = menu
                .get(&line.menu_item_id)
                .ok_or(CartError::UnknownItem(line.menu_item_id))?;
            price_line(line, item)
        })
        .collect()
}

pub fn discount_cents(discount: &Discount, subtotal_cents: u64) -> u64 {
    match *discount {
        Discount::AmountOff { cents } => cents.min(subtotal_cents),
        Discount::PercentOff { percent } => {
            subtotal_cents.saturating_mul(u64::from(percent.min(100))) / 100
        }
        Discount::FreeDelivery => 0,
    }
}

/// Tax in basis points, rounded half up to the cent.
pub fn tax_cents(taxable_cents: u64, rate_bps: u32) -> u64 {
    (taxable_cents.saturating_mul(u64::from(rate_bps)) + 5_000) / 10_000
}

pub fn compute_totals(
    subtotal_cents: u64,
    discount: Option<&Discount>,
    location: &Location,
    fulfillment: Fulfillment,
    tip_cents: u64,
) -> Totals {
    let discount_cents = discount
        .map(|discount| discount_cents(discount, subtotal_cents))
        .unwrap_or(0);
    let free_delivery = matches!(discount, Some(Discount::FreeDelivery));
    let delivery_fee_cents = match fulfillment {
        Fulfillment::Delivery if !free_delivery => location.delivery_fee_cents,
        _ => 0,
    };
    let taxable = subtotal_cents - discount_cents;
    let tax_cents = tax_cents(taxable, location.tax_rate_bps);

    Totals {
        subtotal_cents,
        discount_cents,
        delivery_fee_cents,
        tax_cents,
        tip_cents,
        total_cents: taxable
            .saturating_add(delivery_fee_cents)
            .saturating_add(tax_cents)
            .saturating_add(tip_cents),
    }
}

pub fn check_promo(
    promo: &PromoCode,
    subtotal_cents: u64,
    now: DateTime<Utc>,
) -> Result<(), CartError> {
    if !promo.active {
        return Err(CartError::PromoInvalid(promo.code.clone()));
    }
    if promo.expires_at.is_some_and(|expires| now >= expires) {
        return Err(CartError::PromoExpired(promo.code.clone()));
    }
    if promo.max_uses.is_some_and(|max| promo.uses >= max) {
        return Err(CartError::PromoExhausted(promo.code.clone()));
    }
    if subtotal_cents < promo.min_subtotal_cents {
        return Err(CartError::PromoMinimum {
            code: promo.code.clone(),
            minimum_cents: promo.min_subtotal_cents,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddOn, Variant};

    fn ramen() -> MenuItem {
        MenuItem {
            id: Uuid::new_v4(),
            category: "Bowls".into(),
            name: "Spicy Ramen".into(),
            description: String::new(),
            price_cents: 1200,
            variants: vec![
                Variant {
                    id: "regular".into(),
                    name: "Regular".into(),
                    price_cents: 1200,
                },
                Variant {
                    id: "large".into(),
                    name: "Large".into(),
                    price_cents: 1500,
                },
            ],
            add_ons: vec![AddOn {
                id: "egg".into(),
                name: "Soft egg".into(),
                price_cents: 150,
            }],
            spicy: true,
            image_url: None,
            sort_order: 0,
            available: true,
        }
    }

    fn location() -> Location {
        Location {
            id: Uuid::new_v4(),
            name: "Downtown".into(),
            address: "1 Main St".into(),
            hours: Vec::new(),
            delivery_fee_cents: 399,
            delivery_min_subtotal_cents: 0,
            tax_rate_bps: 825,
            pickup_enabled: true,
            delivery_enabled: true,
            active: true,
        }
    }

    fn line(item: &MenuItem, variant: Option<&str>, quantity: u32) -> CartLine {
        CartLine {
            menu_item_id: item.id,
            variant_id: variant.map(str::to_string),
            add_on_ids: vec!["egg".into()],
            spice_level: Some(SpiceLevel::Hot),
            quantity,
            note: Some("  no scallions ".into()),
        }
    }

    #[test]
    fn lines_price_variant_plus_add_ons() {
        let item = ramen();
        let menu = BTreeMap::from([(item.id, item.clone())]);
        let cart = Cart {
            lines: vec![line(&item, Some("large"), 2)],
            ..Cart::default()
        };
        let items = price_lines(&cart, &menu).unwrap();
        assert_eq!(items[0].unit_price_cents, 1650);
        assert_eq!(items[0].line_total_cents, 3300);
        assert_eq!(items[0].variant.as_deref(), Some("Large"));
        assert_eq!(items[0].note.as_deref(), Some("no scallions"));
    }

    #[test]
    fn invalid_lines_are_rejected() {
        let mut item = ramen();
        let menu = BTreeMap::from([(item.id, item.clone())]);
        let price = |cart_line: CartLine| {
            price_lines(
                &Cart {
                    lines: vec![cart_line],
                    ..Cart::default()
                },
                &menu,
            )
        };

        assert_eq!(
            price(line(&item, None, 1)),
            Err(CartError::VariantRequired("Spicy Ramen".into()))
        );
        assert_eq!(
            price(line(&item, Some("regular"), 0)),
            Err(CartError::InvalidQuantity(0))
        );
        assert!(matches!(
            price(line(&item, Some("huge"), 1)),
            Err(CartError::UnknownVariant { .. })
        ));

        item.id = Uuid::new_v4();
        assert_eq!(
            price(line(&item, Some("regular"), 1)),
            Err(CartError::UnknownItem(item.id))
        );
        assert_eq!(price_lines(&Cart::default(), &menu), Err(CartError::Empty));
    }

    #[test]
    fn spice_level_needs_a_spicy_item() {
        let mut item = ramen();
        item.spicy = false;
        let menu = BTreeMap::from([(item.id, item.clone())]);
        let cart = Cart {
            lines: vec![line(&item, Some("regular"), 1)],
            ..Cart::default()
        };
        assert_eq!(
            price_lines(&cart, &menu),
            Err(CartError::SpiceNotOffered("Spicy Ramen".into()))
        );
    }

    #[test]
    fn totals_apply_discount_fee_tax_and_tip() {
        let loc = location();
        let totals = compute_totals(
            2000,
            Some(&Discount::PercentOff { percent: 10 }),
            &loc,
            Fulfillment::Delivery,
            300,
        );
        assert_eq!(totals.discount_cents, 200);
        assert_eq!(totals.delivery_fee_cents, 399);
        // 8.25% of 18.00 = 1.485, rounded half up.
        assert_eq!(totals.tax_cents, 149);
        assert_eq!(totals.total_cents, 1800 + 399 + 149 + 300);

        let pickup = compute_totals(2000, None, &loc, Fulfillment::Pickup, 0);
        assert_eq!(pickup.delivery_fee_cents, 0);
        assert_eq!(pickup.total_cents, 2000 + 165);
    }

    #[test]
    fn amount_off_is_clamped_and_free_delivery_waives_fee() {
        let loc = location();
        let clamped = compute_totals(
            500,
            Some(&Discount::AmountOff { cents: 900 }),
            &loc,
            Fulfillment::Pickup,
            0,
        );
        assert_eq!(clamped.discount_cents, 500);
        assert_eq!(clamped.total_cents, 0);

        let free = compute_totals(
            1000,
            Some(&Discount::FreeDelivery),
            &loc,
            Fulfillment::Delivery,
            0,
        );
        assert_eq!(free.delivery_fee_cents, 0);
        assert_eq!(free.discount_cents, 0);
    }

    #[test]
    fn promo_rules_are_enforced() {
        let now = Utc::now();
        let mut promo = PromoCode {
            code: "WELCOME".into(),
            description: String::new(),
            discount: Discount::AmountOff { cents: 500 },
            min_subtotal_cents: 1500,
            max_uses: Some(1),
            uses: 0,
            expires_at: None,
            active: true,
        };
        assert!(check_promo(&promo, 1500, now).is_ok());
        assert!(matches!(
            check_promo(&promo, 1499, now),
            Err(CartError::PromoMinimum { .. })
        ));
        promo.uses = 1;
        assert_eq!(
            check_promo(&promo, 2000, now),
            Err(CartError::PromoExhausted("WELCOME".into()))
        );
        promo.uses = 0;
        promo.expires_at = Some(now);
        assert_eq!(
            check_promo(&promo, 2000, now),
            Err(CartError::PromoExpired("WELCOME".into()))
        );
    }

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(normalize_code("  welcome10 "), "WELCOME10");
    }
}
