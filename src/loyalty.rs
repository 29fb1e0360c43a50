//! MESO Club: points ledger, tiers and the single-active-coupon rule.

use crate::models::{
    Coupon, CouponStatus, LedgerEntry, LedgerKind, LoyaltyAccount, LoyaltyRules, Order, StoreData,
    TierThresholds,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoyaltyError {
    #[error("unknown reward {0}")]
    UnknownReward(Uuid),
    #[error("reward '{0}' is not available")]
    RewardInactive(String),
    #[error("not enough points: {needed} needed, {balance} available")]
    InsufficientPoints { needed: u64, balance: u64 },
    #[error("an active coupon already exists; use it before activating another")]
    CouponAlreadyActive,
    #[error("unknown coupon {0}")]
    UnknownCoupon(Uuid),
    #[error("coupon belongs to another customer")]
    NotOwner,
    #[error("coupon has already been used")]
    CouponUsed,
    #[error("coupon has expired")]
    CouponExpired,
    #[error("tier thresholds must be ascending (bronze < silver < gold)")]
    ThresholdsNotAscending,
    #[error("adjustment of {points} would take the balance of {balance} below zero")]
    NegativeBalance { points: i64, balance: u64 },
}

/// Longest coupon window or retention period the rules may ask for.
pub const MAX_RULE_DAYS: i64 = 3650;

fn rule_days(days: i64) -> Duration {
    Duration::try_days(days.clamp(0, MAX_RULE_DAYS)).unwrap_or_else(Duration::zero)
}

pub fn validate_thresholds(thresholds: &TierThresholds) -> Result<(), LoyaltyError> {
    if thresholds.bronze < thresholds.silver && thresholds.silver < thresholds.gold {
        Ok(())
    } else {
        Err(LoyaltyError::ThresholdsNotAscending)
    }
}

/// Bronze below the silver threshold, gold from the gold threshold upwards.
pub fn tier_for(lifetime_points: u64, thresholds: &TierThresholds) -> Tier {
    if lifetime_points >= thresholds.gold {
        Tier::Gold
    } else if lifetime_points >= thresholds.silver {
        Tier::Silver
    } else {
        Tier::Bronze
    }
}

/// The next tier up and the lifetime points still missing to reach it.
pub fn next_tier(lifetime_points: u64, thresholds: &TierThresholds) -> Option<(Tier, u64)> {
    match tier_for(lifetime_points, thresholds) {
        Tier::Bronze => Some((Tier::Silver, thresholds.silver - lifetime_points)),
        Tier::Silver => Some((Tier::Gold, thresholds.gold - lifetime_points)),
        Tier::Gold => None,
    }
}

/// Points are earned on whole dollars spent after discounts.
pub fn points_for(order: &Order, rules: &LoyaltyRules) -> u64 {
    let spent = order
        .totals
        .subtotal_cents
        .saturating_sub(order.totals.discount_cents);
    (spent / 100).saturating_mul(rules.points_per_dollar)
}

fn account_mut<'a>(
    accounts: &'a mut BTreeMap<String, LoyaltyAccount>,
    customer_id: &str,
    now: DateTime<Utc>,
) -> &'a mut LoyaltyAccount {
    accounts
        .entry(customer_id.to_string())
        .or_insert_with(|| LoyaltyAccount::new(customer_id, now))
}

/// Credits a delivered order to its customer. Returns the points awarded, or
/// `None` when the order has no customer or was already credited.
pub fn award_order(data: &mut StoreData, order_id: Uuid, now: DateTime<Utc>) -> Option<u64> {
    let rules = data.loyalty_rules;
    let order = data.orders.get_mut(&order_id)?;
    let customer_id = order.customer_id.clone()?;
    if order.points_awarded > 0 {
        return None;
    }
    let points = points_for(order, &rules);
    if points == 0 {
        return None;
    }
    order.points_awarded = points;

    let account = account_mut(&mut data.loyalty_accounts, &customer_id, now);
    account.balance = account.balance.saturating_add(points);
    account.lifetime_points = account.lifetime_points.saturating_add(points);
    account.ledger.push(LedgerEntry {
        id: Uuid::new_v4(),
        kind: LedgerKind::Earn,
        points: points as i64,
        order_id: Some(order_id),
        coupon_id: None,
        note: format!("Order #{}", order.number),
        created_at: now,
    });
    info!(%customer_id, %order_id, points, "loyalty points awarded");
    Some(points)
}

/// Lazy coupon housekeeping for one customer: active coupons past their
/// window become expired, and used or expired coupons older than the
/// retention window are dropped. Returns how many coupons were touched.
pub fn cleanup(
    coupons: &mut BTreeMap<Uuid, Coupon>,
    customer_id: &str,
    rules: &LoyaltyRules,
    now: DateTime<Utc>,
) -> usize {
    let retention = rule_days(rules.coupon_retention_days);
    let mut touched = 0;

    for coupon in coupons.values_mut() {
        if coupon.customer_id == customer_id
            && coupon.status == CouponStatus::Active
            && now >= coupon.expires_at
        {
            coupon.status = CouponStatus::Expired;
            touched += 1;
        }
    }

    let before = coupons.len();
    coupons.retain(|_, coupon| {
        if coupon.customer_id != customer_id {
            return true;
        }
        let settled_at = match coupon.status {
            CouponStatus::Active => return true,
            CouponStatus::Used => coupon.used_at.unwrap_or(coupon.created_at),
            CouponStatus::Expired => coupon.expires_at,
        };
        now - settled_at < retention
    });
    touched + (before - coupons.len())
}

pub fn active_coupon<'a>(
    coupons: &'a BTreeMap<Uuid, Coupon>,
    customer_id: &str,
    now: DateTime<Utc>,
) -> Option<&'a Coupon> {
    coupons.values().find(|coupon| {
        coupon.customer_id == customer_id
            && coupon.status == CouponStatus::Active
            && now < coupon.expires_at
    })
}

/// Turns a catalog reward into the customer's coupon, spending its points.
pub fn activate(
    data: &mut StoreData,
    customer_id: &str,
    reward_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Coupon, LoyaltyError> {
    let rules = data.loyalty_rules;
    cleanup(&mut data.coupons, customer_id, &rules, now);

    let reward = data
        .rewards
        .get(&reward_id)
        .ok_or(LoyaltyError::UnknownReward(reward_id))?;
    if !reward.active {
        return Err(LoyaltyError::RewardInactive(reward.name.clone()));
    }
    if active_coupon(&data.coupons, customer_id, now).is_some() {
        return Err(LoyaltyError::CouponAlreadyActive);
    }

    let account = account_mut(&mut data.loyalty_accounts, customer_id, now);
    if account.balance < reward.cost_points {
        return Err(LoyaltyError::InsufficientPoints {
            needed: reward.cost_points,
            balance: account.balance,
        });
    }

    let coupon = Coupon {
        id: Uuid::new_v4(),
        customer_id: customer_id.to_string(),
        reward_id,
        reward_name: reward.name.clone(),
        discount: reward.discount,
        status: CouponStatus::Active,
        created_at: now,
        expires_at: now
            .checked_add_signed(rule_days(rules.coupon_valid_days))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        used_at: None,
        order_id: None,
    };

    account.balance -= reward.cost_points;
    account.ledger.push(LedgerEntry {
        id: Uuid::new_v4(),
        kind: LedgerKind::Redeem,
        points: -(reward.cost_points as i64),
        order_id: None,
        coupon_id: Some(coupon.id),
        note: reward.name.clone(),
        created_at: now,
    });
    data.coupons.insert(coupon.id, coupon.clone());
    info!(customer_id, coupon_id = %coupon.id, "loyalty coupon activated");
    Ok(coupon)
}

/// Checks that a coupon can be applied by this customer right now.
pub fn check_usable(
    coupon: &Coupon,
    customer_id: &str,
    now: DateTime<Utc>,
) -> Result<(), LoyaltyError> {
    if coupon.customer_id != customer_id {
        return Err(LoyaltyError::NotOwner);
    }
    match coupon.status {
        CouponStatus::Used => Err(LoyaltyError::CouponUsed),
        CouponStatus::Expired => Err(LoyaltyError::CouponExpired),
        CouponStatus::Active if now >= coupon.expires_at => Err(LoyaltyError::CouponExpired),
        CouponStatus::Active => Ok(()),
    }
}

pub fn consume(
    coupon: &mut Coupon,
    customer_id: &str,
    order_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), LoyaltyError> {
    check_usable(coupon, customer_id, now)?;
    coupon.status = CouponStatus::Used;
    coupon.used_at = Some(now);
    coupon.order_id = Some(order_id);
    Ok(())
}

/// Gives a coupon back after its order failed or was cancelled. A coupon
/// whose window has passed in the meantime comes back expired.
pub fn restore(coupon: &mut Coupon, now: DateTime<Utc>) -> bool {
    if coupon.status != CouponStatus::Used {
        return false;
    }
    coupon.used_at = None;
    coupon.order_id = None;
    coupon.status = if now < coupon.expires_at {
        CouponStatus::Active
    } else {
        CouponStatus::Expired
    };
    true
}

/// Manual correction by staff. Positive adjustments count towards the tier.
pub fn adjust(
    data: &mut StoreData,
    customer_id: &str,
    points: i64,
    note: &str,
    now: DateTime<Utc>,
) -> Result<LoyaltyAccount, LoyaltyError> {
    let account = account_mut(&mut data.loyalty_accounts, customer_id, now);
    let magnitude = points.unsigned_abs();
    if points < 0 {
        if magnitude > account.balance {
            return Err(LoyaltyError::NegativeBalance {
                points,
                balance: account.balance,
            });
        }
        account.balance -= magnitude;
    } else {
        account.balance = account.balance.saturating_add(magnitude);
        account.lifetime_points = account.lifetime_points.saturating_add(magnitude);
    }
    account.ledger.push(LedgerEntry {
        id: Uuid::new_v4(),
        kind: LedgerKind::Adjust,
        points,
        order_id: None,
        coupon_id: None,
        note: note.to_string(),
        created_at: now,
    });
    Ok(account.clone())
}

#[derive(Debug, Clone, Serialize)]
pub struct LoyaltySummary {
    pub customer_id: String,
    pub balance: u64,
    pub lifetime_points: u64,
    pub tier: Tier,
    pub next_tier: Option<Tier>,
    pub points_to_next_tier: Option<u64>,
    pub active_coupon: Option<Coupon>,
}

pub fn summary(data: &StoreData, customer_id: &str, now: DateTime<Utc>) -> LoyaltySummary {
    let thresholds = &data.loyalty_rules.thresholds;
    let (balance, lifetime_points) = data
        .loyalty_accounts
        .get(customer_id)
        .map(|account| (account.balance, account.lifetime_points))
        .unwrap_or_default();
    let next = next_tier(lifetime_points, thresholds);

    LoyaltySummary {
        customer_id: customer_id.to_string(),
        balance,
        lifetime_points,
        tier: tier_for(lifetime_points, thresholds),
        next_tier: next.map(|(tier, _)| tier),
        points_to_next_tier: next.map(|(_, missing)| missing),
        active_coupon: active_coupon(&data.coupons, customer_id, now).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Discount, Reward};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn data_with_reward(balance: u64, cost: u64) -> (StoreData, Uuid) {
        let mut data = StoreData::default();
        let reward = Reward {
            id: Uuid::new_v4(),
            name: "Free dumplings".into(),
            description: String::new(),
            cost_points: cost,
            discount: Discount::AmountOff { cents: 600 },
            active: true,
        };
        let reward_id = reward.id;
        data.rewards.insert(reward_id, reward);
        let mut account = LoyaltyAccount::new("cust-1", now());
        account.balance = balance;
        account.lifetime_points = balance;
        data.loyalty_accounts.insert("cust-1".into(), account);
        (data, reward_id)
    }

    #[test]
    fn tiers_follow_thresholds() {
        let thresholds = TierThresholds {
            bronze: 100,
            silver: 500,
            gold: 1500,
        };
        assert_eq!(tier_for(0, &thresholds), Tier::Bronze);
        assert_eq!(tier_for(499, &thresholds), Tier::Bronze);
        assert_eq!(tier_for(500, &thresholds), Tier::Silver);
        assert_eq!(tier_for(1499, &thresholds), Tier::Silver);
        assert_eq!(tier_for(1500, &thresholds), Tier::Gold);
        assert_eq!(tier_for(u64::MAX, &thresholds), Tier::Gold);
        assert_eq!(next_tier(120, &thresholds), Some((Tier::Silver, 380)));
        assert_eq!(next_tier(2000, &thresholds), None);
    }

    #[test]
    fn thresholds_must_ascend() {
        assert!(validate_thresholds(&TierThresholds::default()).is_ok());
        assert_eq!(
            validate_thresholds(&TierThresholds {
                bronze: 0,
                silver: 500,
                gold: 500
            }),
            Err(LoyaltyError::ThresholdsNotAscending)
        );
    }

    #[test]
    fn activation_spends_points_once() {
        let (mut data, reward_id) = data_with_reward(300, 250);
        let coupon = activate(&mut data, "cust-1", reward_id, now()).unwrap();
        assert_eq!(coupon.status, CouponStatus::Active);
        let account = &data.loyalty_accounts["cust-1"];
        assert_eq!(account.balance, 50);
        assert_eq!(account.lifetime_points, 300);
        assert_eq!(account.ledger.last().unwrap().points, -250);
    }

    #[test]
    fn only_one_active_coupon_at_a_time() {
        let (mut data, reward_id) = data_with_reward(1000, 100);
        activate(&mut data, "cust-1", reward_id, now()).unwrap();
        assert_eq!(
            activate(&mut data, "cust-1", reward_id, now()),
            Err(LoyaltyError::CouponAlreadyActive)
        );
        assert_eq!(data.loyalty_accounts["cust-1"].balance, 900);
    }

    #[test]
    fn used_coupon_frees_the_slot() {
        let (mut data, reward_id) = data_with_reward(1000, 100);
        let coupon = activate(&mut data, "cust-1", reward_id, now()).unwrap();
        let stored = data.coupons.get_mut(&coupon.id).unwrap();
        consume(stored, "cust-1", Uuid::new_v4(), now()).unwrap();
        assert!(activate(&mut data, "cust-1", reward_id, now()).is_ok());
    }

    #[test]
    fn insufficient_points_are_rejected() {
        let (mut data, reward_id) = data_with_reward(99, 100);
        assert_eq!(
            activate(&mut data, "cust-1", reward_id, now()),
            Err(LoyaltyError::InsufficientPoints {
                needed: 100,
                balance: 99
            })
        );
    }

    #[test]
    fn cleanup_expires_then_drops_coupons() {
        let (mut data, reward_id) = data_with_reward(1000, 100);
        let coupon = activate(&mut data, "cust-1", reward_id, now()).unwrap();
        let rules = data.loyalty_rules;

        let after_window = coupon.expires_at + Duration::hours(1);
        assert_eq!(cleanup(&mut data.coupons, "cust-1", &rules, after_window), 1);
        assert_eq!(data.coupons[&coupon.id].status, CouponStatus::Expired);
        assert!(active_coupon(&data.coupons, "cust-1", after_window).is_none());

        let after_retention = coupon.expires_at + Duration::days(rules.coupon_retention_days);
        cleanup(&mut data.coupons, "cust-1", &rules, after_retention);
        assert!(data.coupons.is_empty());
    }

    #[test]
    fn oversized_rule_windows_are_capped() {
        let (mut data, reward_id) = data_with_reward(1000, 100);
        data.loyalty_rules.coupon_valid_days = 100_000_000;
        data.loyalty_rules.coupon_retention_days = i64::MAX / 2;
        let coupon = activate(&mut data, "cust-1", reward_id, now()).unwrap();
        assert_eq!(coupon.expires_at, now() + Duration::days(MAX_RULE_DAYS));

        let rules = data.loyalty_rules;
        let later = coupon.expires_at + Duration::days(1);
        assert_eq!(cleanup(&mut data.coupons, "cust-1", &rules, later), 1);
        assert_eq!(data.coupons[&coupon.id].status, CouponStatus::Expired);
    }

    #[test]
    fn restore_reactivates_unexpired_coupon() {
        let (mut data, reward_id) = data_with_reward(1000, 100);
        let coupon = activate(&mut data, "cust-1", reward_id, now()).unwrap();
        let stored = data.coupons.get_mut(&coupon.id).unwrap();
        consume(stored, "cust-1", Uuid::new_v4(), now()).unwrap();
        assert_eq!(consume(stored, "cust-1", Uuid::new_v4(), now()), Err(LoyaltyError::CouponUsed));
        assert!(restore(stored, now()));
        assert_eq!(stored.status, CouponStatus::Active);
        assert!(stored.order_id.is_none());
    }

    #[test]
    fn adjustments_cannot_overdraw() {
        let (mut data, _) = data_with_reward(40, 100);
        let account = adjust(&mut data, "cust-1", 60, "apology", now()).unwrap();
        assert_eq!(account.balance, 100);
        assert_eq!(account.lifetime_points, 100);
        assert_eq!(
            adjust(&mut data, "cust-1", -101, "typo", now()).unwrap_err(),
            LoyaltyError::NegativeBalance {
                points: -101,
                balance: 100
            }
        );
        let account = adjust(&mut data, "cust-1", -100, "typo", now()).unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.lifetime_points, 100);
    }

    #[test]
    fn coupons_are_not_transferable() {
        let (mut data, reward_id) = data_with_reward(1000, 100);
        let coupon = activate(&mut data, "cust-1", reward_id, now()).unwrap();
        assert_eq!(
            check_usable(&coupon, "someone-else", now()),
            Err(LoyaltyError::NotOwner)
        );
    }
}
