use crate::status::{Fulfillment, OrderStatus, PaymentStatus};
use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Everything the storefront persists, written as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreData {
    pub menu: BTreeMap<Uuid, MenuItem>,
    pub locations: BTreeMap<Uuid, Location>,
    /// Keyed by the normalized (upper-case) code.
    pub promo_codes: BTreeMap<String, PromoCode>,
    pub banners: BTreeMap<Uuid, Banner>,
    pub rewards: BTreeMap<Uuid, Reward>,
    pub loyalty_rules: LoyaltyRules,
    pub loyalty_accounts: BTreeMap<String, LoyaltyAccount>,
    pub coupons: BTreeMap<Uuid, Coupon>,
    pub orders: BTreeMap<Uuid, Order>,
    pub next_order_number: u64,
}

impl StoreData {
    pub fn take_order_number(&mut self) -> u64 {
        self.next_order_number = self.next_order_number.saturating_add(1).max(1001);
        self.next_order_number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiceLevel {
    Mild,
    Medium,
    Hot,
    ExtraHot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub name: String,
    pub price_cents: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub id: String,
    pub name: String,
    pub price_cents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: u64,
    /// When non-empty, a cart line must pick one; its price replaces the base price.
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
    #[serde(default)]
    pub spicy: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub weekday: Weekday,
    pub open: NaiveTime,
    /// A close before `open` runs into the early hours of the next day; equal
    /// times mean open all day.
    pub close: NaiveTime,
}

impl OpeningHours {
    fn contains(&self, at: NaiveDateTime) -> bool {
        let day = at.weekday();
        let time = at.time();
        if self.open == self.close {
            day == self.weekday
        } else if self.open < self.close {
            day == self.weekday && time >= self.open && time < self.close
        } else {
            // The tail of an overnight shift belongs to the next calendar day.
            (day == self.weekday && time >= self.open)
                || (day == self.weekday.succ() && time < self.close)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub hours: Vec<OpeningHours>,
    #[serde(default)]
    pub delivery_fee_cents: u64,
    #[serde(default)]
    pub delivery_min_subtotal_cents: u64,
    /// Basis points, 825 = 8.25%.
    #[serde(default)]
    pub tax_rate_bps: u32,
    pub pickup_enabled: bool,
    pub delivery_enabled: bool,
    pub active: bool,
}

impl Location {
    pub fn is_open_at(&self, at: NaiveDateTime) -> bool {
        self.hours.iter().any(|window| window.contains(at))
    }

    pub fn offers(&self, fulfillment: Fulfillment) -> bool {
        match fulfillment {
            Fulfillment::Pickup => self.pickup_enabled,
            Fulfillment::Delivery => self.delivery_enabled,
        }
    }
}

/// A price reduction shared by promo codes and loyalty rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discount {
    AmountOff { cents: u64 },
    PercentOff { percent: u8 },
    FreeDelivery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount: Discount,
    #[serde(default)]
    pub min_subtotal_cents: u64,
    #[serde(default)]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub uses: u32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Banner {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Banner {
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.starts_at.is_none_or(|start| now >= start)
            && self.ends_at.is_none_or(|end| now < end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub bronze: u64,
    pub silver: u64,
    pub gold: u64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            bronze: 0,
            silver: 500,
            gold: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyRules {
    pub thresholds: TierThresholds,
    pub points_per_dollar: u64,
    pub coupon_valid_days: i64,
    /// How long used or expired coupons are kept before cleanup drops them.
    pub coupon_retention_days: i64,
}

impl Default for LoyaltyRules {
    fn default() -> Self {
        Self {
            thresholds: TierThresholds::default(),
            points_per_dollar: 1,
            coupon_valid_days: 30,
            coupon_retention_days: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Earn,
    Redeem,
    Adjust,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub kind: LedgerKind,
    pub points: i64,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub coupon_id: Option<Uuid>,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub customer_id: String,
    pub balance: u64,
    /// Ever-earned points; redemptions never lower it.
    pub lifetime_points: u64,
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,
    pub created_at: DateTime<Utc>,
}

impl LoyaltyAccount {
    pub fn new(customer_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            customer_id: customer_id.into(),
            balance: 0,
            lifetime_points: 0,
            ledger: Vec::new(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost_points: u64,
    pub discount: Discount,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Active,
    Used,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub customer_id: String,
    pub reward_id: Uuid,
    pub reward_name: String,
    pub discount: Discount,
    pub status: CouponStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub add_ons: Vec<String>,
    #[serde(default)]
    pub spice_level: Option<SpiceLevel>,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub line_total_cents: u64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Totals {
    pub subtotal_cents: u64,
    pub discount_cents: u64,
    pub delivery_fee_cents: u64,
    pub tax_cents: u64,
    pub tip_cents: u64,
    pub total_cents: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatusTimestamps {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub courier_requested_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    pub fn stamp(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let slot = match status {
            OrderStatus::PendingPayment => return,
            OrderStatus::Confirmed => &mut self.confirmed_at,
            OrderStatus::Preparing => &mut self.preparing_at,
            OrderStatus::Ready => &mut self.ready_at,
            OrderStatus::AwaitingCourier => &mut self.courier_requested_at,
            OrderStatus::InDelivery => &mut self.out_for_delivery_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            OrderStatus::Failed => &mut self.failed_at,
        };
        *slot = Some(at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub number: u64,
    pub location_id: Uuid,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub fulfillment: Fulfillment,
    pub contact: Contact,
    #[serde(default)]
    pub delivery_address: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_session_id: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub totals: Totals,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub coupon_id: Option<Uuid>,
    #[serde(default)]
    pub points_awarded: u64,
    #[serde(default)]
    pub timestamps: StatusTimestamps,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
