//! Store configuration managed from the operator dashboard.
//!
//! Every entity follows the same shape: create from an input, replace with an
//! input, deactivate instead of delete so past orders keep their references.

use crate::cart::normalize_code;
use crate::loyalty::{self, LoyaltyError};
use crate::models::{
    AddOn, Banner, Discount, Location, LoyaltyRules, MenuItem, OpeningHours, PromoCode, Reward,
    StoreData, Variant,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

fn invalid(message: impl Into<String>) -> SettingsError {
    SettingsError::Invalid(message.into())
}

fn required(field: &str, value: &str) -> Result<String, SettingsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn check_discount(discount: &Discount) -> Result<(), SettingsError> {
    match *discount {
        Discount::AmountOff { cents: 0 } => Err(invalid("amount off must be positive")),
        Discount::PercentOff { percent } if percent == 0 || percent > 100 => {
            Err(invalid("percent off must be between 1 and 100"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub hours: Vec<OpeningHours>,
    #[serde(default)]
    pub delivery_fee_cents: u64,
    #[serde(default)]
    pub delivery_min_subtotal_cents: u64,
    #[serde(default)]
    pub tax_rate_bps: u32,
    pub pickup_enabled: bool,
    pub delivery_enabled: bool,
    #[serde(default = "enabled")]
    pub active: bool,
}

fn enabled() -> bool {
    true
}

impl LocationInput {
    fn into_location(self, id: Uuid) -> Result<Location, SettingsError> {
        if self.tax_rate_bps > 5_000 {
            return Err(invalid("tax rate cannot exceed 50%"));
        }
        if !self.pickup_enabled && !self.delivery_enabled {
            return Err(invalid("a location must offer pickup or delivery"));
        }
        Ok(Location {
            id,
            name: required("name", &self.name)?,
            address: required("address", &self.address)?,
            hours: self.hours,
            delivery_fee_cents: self.delivery_fee_cents,
            delivery_min_subtotal_cents: self.delivery_min_subtotal_cents,
            tax_rate_bps: self.tax_rate_bps,
            pickup_enabled: self.pickup_enabled,
            delivery_enabled: self.delivery_enabled,
            active: self.active,
        })
    }
}

pub fn create_location(data: &mut StoreData, input: LocationInput) -> Result<Location, SettingsError> {
    let location = input.into_location(Uuid::new_v4())?;
    data.locations.insert(location.id, location.clone());
    info!(location_id = %location.id, name = %location.name, "location created");
    Ok(location)
}

pub fn update_location(
    data: &mut StoreData,
    id: Uuid,
    input: LocationInput,
) -> Result<Location, SettingsError> {
    let slot = data
        .locations
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("location {id}")))?;
    *slot = input.into_location(id)?;
    Ok(slot.clone())
}

pub fn deactivate_location(data: &mut StoreData, id: Uuid) -> Result<Location, SettingsError> {
    let location = data
        .locations
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("location {id}")))?;
    location.active = false;
    Ok(location.clone())
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromoInput {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount: Discount,
    #[serde(default)]
    pub min_subtotal_cents: u64,
    #[serde(default)]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "enabled")]
    pub active: bool,
}

impl PromoInput {
    fn into_promo(self, uses: u32) -> Result<PromoCode, SettingsError> {
        let code = normalize_code(&self.code);
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("promo codes use letters, digits and dashes"));
        }
        check_discount(&self.discount)?;
        Ok(PromoCode {
            code,
            description: self.description.trim().to_string(),
            discount: self.discount,
            min_subtotal_cents: self.min_subtotal_cents,
            max_uses: self.max_uses,
            uses,
            expires_at: self.expires_at,
            active: self.active,
        })
    }
}

pub fn create_promo(data: &mut StoreData, input: PromoInput) -> Result<PromoCode, SettingsError> {
    let promo = input.into_promo(0)?;
    if data.promo_codes.contains_key(&promo.code) {
        return Err(SettingsError::Duplicate(format!("promo code {}", promo.code)));
    }
    data.promo_codes.insert(promo.code.clone(), promo.clone());
    info!(code = %promo.code, "promo code created");
    Ok(promo)
}

/// Replaces a promo code's terms. The code itself cannot be renamed.
pub fn update_promo(
    data: &mut StoreData,
    code: &str,
    input: PromoInput,
) -> Result<PromoCode, SettingsError> {
    let code = normalize_code(code);
    let slot = data
        .promo_codes
        .get_mut(&code)
        .ok_or_else(|| SettingsError::NotFound(format!("promo code {code}")))?;
    let updated = input.into_promo(slot.uses)?;
    if updated.code != code {
        return Err(invalid("promo codes cannot be renamed"));
    }
    *slot = updated;
    Ok(slot.clone())
}

pub fn deactivate_promo(data: &mut StoreData, code: &str) -> Result<PromoCode, SettingsError> {
    let code = normalize_code(code);
    let promo = data
        .promo_codes
        .get_mut(&code)
        .ok_or_else(|| SettingsError::NotFound(format!("promo code {code}")))?;
    promo.active = false;
    Ok(promo.clone())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost_points: u64,
    pub discount: Discount,
    #[serde(default = "enabled")]
    pub active: bool,
}

impl RewardInput {
    fn into_reward(self, id: Uuid) -> Result<Reward, SettingsError> {
        if self.cost_points == 0 {
            return Err(invalid("rewards must cost at least one point"));
        }
        check_discount(&self.discount)?;
        Ok(Reward {
            id,
            name: required("name", &self.name)?,
            description: self.description.trim().to_string(),
            cost_points: self.cost_points,
            discount: self.discount,
            active: self.active,
        })
    }
}

pub fn create_reward(data: &mut StoreData, input: RewardInput) -> Result<Reward, SettingsError> {
    let reward = input.into_reward(Uuid::new_v4())?;
    data.rewards.insert(reward.id, reward.clone());
    info!(reward_id = %reward.id, name = %reward.name, "reward created");
    Ok(reward)
}

pub fn update_reward(
    data: &mut StoreData,
    id: Uuid,
    input: RewardInput,
) -> Result<Reward, SettingsError> {
    let slot = data
        .rewards
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("reward {id}")))?;
    *slot = input.into_reward(id)?;
    Ok(slot.clone())
}

pub fn deactivate_reward(data: &mut StoreData, id: Uuid) -> Result<Reward, SettingsError> {
    let reward = data
        .rewards
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("reward {id}")))?;
    reward.active = false;
    Ok(reward.clone())
}

pub fn update_loyalty_rules(
    data: &mut StoreData,
    rules: LoyaltyRules,
) -> Result<LoyaltyRules, SettingsError> {
    loyalty::validate_thresholds(&rules.thresholds)?;
    if rules.points_per_dollar == 0 {
        return Err(invalid("points per dollar must be at least 1"));
    }
    if !(1..=loyalty::MAX_RULE_DAYS).contains(&rules.coupon_valid_days) {
        return Err(invalid(format!(
            "coupons must stay valid between 1 and {} days",
            loyalty::MAX_RULE_DAYS
        )));
    }
    if !(0..=loyalty::MAX_RULE_DAYS).contains(&rules.coupon_retention_days) {
        return Err(invalid(format!(
            "coupon retention must be between 0 and {} days",
            loyalty::MAX_RULE_DAYS
        )));
    }
    data.loyalty_rules = rules;
    info!(?rules, "loyalty rules updated");
    Ok(rules)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerInput {
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
    #[serde(default = "enabled")]
    pub active: bool,
}

impl BannerInput {
    fn into_banner(self, id: Uuid) -> Result<Banner, SettingsError> {
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end <= start {
                return Err(invalid("banner must end after it starts"));
            }
        }
        Ok(Banner {
            id,
            title: required("title", &self.title)?,
            body: self.body.trim().to_string(),
            image_url: self.image_url,
            link_url: self.link_url,
            sort_order: self.sort_order,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            active: self.active,
        })
    }
}

pub fn create_banner(data: &mut StoreData, input: BannerInput) -> Result<Banner, SettingsError> {
    let banner = input.into_banner(Uuid::new_v4())?;
    data.banners.insert(banner.id, banner.clone());
    Ok(banner)
}

pub fn update_banner(
    data: &mut StoreData,
    id: Uuid,
    input: BannerInput,
) -> Result<Banner, SettingsError> {
    let slot = data
        .banners
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("banner {id}")))?;
    *slot = input.into_banner(id)?;
    Ok(slot.clone())
}

pub fn deactivate_banner(data: &mut StoreData, id: Uuid) -> Result<Banner, SettingsError> {
    let banner = data
        .banners
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("banner {id}")))?;
    banner.active = false;
    Ok(banner.clone())
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuItemInput {
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: u64,
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
    #[serde(default = "enabled")]
    pub available: bool,
}

fn unique_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), SettingsError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(invalid(format!("{kind} ids cannot be empty")));
        }
        if !seen.insert(id) {
            return Err(invalid(format!("duplicate {kind} id '{id}'")));
        }
    }
    Ok(())
}

impl MenuItemInput {
    fn into_item(self, id: Uuid) -> Result<MenuItem, SettingsError> {
        unique_ids("variant", self.variants.iter().map(|v| v.id.as_str()))?;
        unique_ids("add-on", self.add_ons.iter().map(|a| a.id.as_str()))?;
        Ok(MenuItem {
            id,
            category: required("category", &self.category)?,
            name: required("name", &self.name)?,
            description: self.description.trim().to_string(),
            price_cents: self.price_cents,
            variants: self.variants,
            add_ons: self.add_ons,
            spicy: self.spicy,
            image_url: self.image_url,
            sort_order: self.sort_order,
            available: self.available,
        })
    }
}

pub fn create_menu_item(
    data: &mut StoreData,
    input: MenuItemInput,
) -> Result<MenuItem, SettingsError> {
    let item = input.into_item(Uuid::new_v4())?;
    data.menu.insert(item.id, item.clone());
    info!(menu_item_id = %item.id, name = %item.name, "menu item created");
    Ok(item)
}

pub fn update_menu_item(
    data: &mut StoreData,
    id: Uuid,
    input: MenuItemInput,
) -> Result<MenuItem, SettingsError> {
    let slot = data
        .menu
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("menu item {id}")))?;
    *slot = input.into_item(id)?;
    Ok(slot.clone())
}

/// Takes an item off the menu without deleting it.
pub fn deactivate_menu_item(data: &mut StoreData, id: Uuid) -> Result<MenuItem, SettingsError> {
    let item = data
        .menu
        .get_mut(&id)
        .ok_or_else(|| SettingsError::NotFound(format!("menu item {id}")))?;
    item.available = false;
    Ok(item.clone())
}
