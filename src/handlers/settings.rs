//! Operator-only configuration endpoints. Lists include inactive entries;
//! DELETE deactivates.

use super::operator::OperatorGuard;
use crate::errors::AppError;
use crate::models::{Banner, Location, LoyaltyRules, MenuItem, PromoCode, Reward, StoreData};
use crate::settings::{
    self, BannerInput, LocationInput, MenuItemInput, PromoInput, RewardInput, SettingsError,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

async fn apply<T>(
    state: &AppState,
    change: impl FnOnce(&mut StoreData) -> Result<T, SettingsError>,
) -> Result<T, AppError> {
    let mut data = state.data.lock().await;
    let value = change(&mut data)?;
    state.persist(&data).await?;
    Ok(value)
}

pub async fn list_locations(
    State(state): State<AppState>,
    _guard: OperatorGuard,
) -> Json<Vec<Location>> {
    let data = state.data.lock().await;
    Json(data.locations.values().cloned().collect())
}

pub async fn create_location(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Json(input): Json<LocationInput>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    let location = apply(&state, |data| settings::create_location(data, input)).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn update_location(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
    Json(input): Json<LocationInput>,
) -> Result<Json<Location>, AppError> {
    Ok(Json(apply(&state, |data| settings::update_location(data, id, input)).await?))
}

pub async fn deactivate_location(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
) -> Result<Json<Location>, AppError> {
    Ok(Json(apply(&state, |data| settings::deactivate_location(data, id)).await?))
}

pub async fn list_promos(
    State(state): State<AppState>,
    _guard: OperatorGuard,
) -> Json<Vec<PromoCode>> {
    let data = state.data.lock().await;
    Json(data.promo_codes.values().cloned().collect())
}

pub async fn create_promo(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Json(input): Json<PromoInput>,
) -> Result<(StatusCode, Json<PromoCode>), AppError> {
    let promo = apply(&state, |data| settings::create_promo(data, input)).await?;
    Ok((StatusCode::CREATED, Json(promo)))
}

pub async fn update_promo(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(code): Path<String>,
    Json(input): Json<PromoInput>,
) -> Result<Json<PromoCode>, AppError> {
    Ok(Json(apply(&state, |data| settings::update_promo(data, &code, input)).await?))
}

pub async fn deactivate_promo(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(code): Path<String>,
) -> Result<Json<PromoCode>, AppError> {
    Ok(Json(apply(&state, |data| settings::deactivate_promo(data, &code)).await?))
}

pub async fn list_rewards(
    State(state): State<AppState>,
    _guard: OperatorGuard,
) -> Json<Vec<Reward>> {
    let data = state.data.lock().await;
    Json(data.rewards.values().cloned().collect())
}

pub async fn create_reward(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Json(input): Json<RewardInput>,
) -> Result<(StatusCode, Json<Reward>), AppError> {
    let reward = apply(&state, |data| settings::create_reward(data, input)).await?;
    Ok((StatusCode::CREATED, Json(reward)))
}

pub async fn update_reward(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
    Json(input): Json<RewardInput>,
) -> Result<Json<Reward>, AppError> {
    Ok(Json(apply(&state, |data| settings::update_reward(data, id, input)).await?))
}

pub async fn deactivate_reward(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
) -> Result<Json<Reward>, AppError> {
    Ok(Json(apply(&state, |data| settings::deactivate_reward(data, id)).await?))
}

pub async fn get_loyalty_rules(
    State(state): State<AppState>,
    _guard: OperatorGuard,
) -> Json<LoyaltyRules> {
    Json(state.data.lock().await.loyalty_rules)
}

pub async fn update_loyalty_rules(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Json(rules): Json<LoyaltyRules>,
) -> Result<Json<LoyaltyRules>, AppError> {
    Ok(Json(apply(&state, |data| settings::update_loyalty_rules(data, rules)).await?))
}

pub async fn list_banners(
    State(state): State<AppState>,
    _guard: OperatorGuard,
) -> Json<Vec<Banner>> {
    let data = state.data.lock().await;
    let mut banners: Vec<Banner> = data.banners.values().cloned().collect();
    banners.sort_by_key(|banner| banner.sort_order);
    Json(banners)
}

pub async fn create_banner(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Json(input): Json<BannerInput>,
) -> Result<(StatusCode, Json<Banner>), AppError> {
    let banner = apply(&state, |data| settings::create_banner(data, input)).await?;
    Ok((StatusCode::CREATED, Json(banner)))
}

pub async fn update_banner(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
    Json(input): Json<BannerInput>,
) -> Result<Json<Banner>, AppError> {
    Ok(Json(apply(&state, |data| settings::update_banner(data, id, input)).await?))
}

pub async fn deactivate_banner(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
) -> Result<Json<Banner>, AppError> {
    Ok(Json(apply(&state, |data| settings::deactivate_banner(data, id)).await?))
}

pub async fn list_menu(
    State(state): State<AppState>,
    _guard: OperatorGuard,
) -> Json<Vec<MenuItem>> {
    let data = state.data.lock().await;
    Json(data.menu.values().cloned().collect())
}

pub async fn create_menu_item(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Json(input): Json<MenuItemInput>,
) -> Result<(StatusCode, Json<MenuItem>), AppError> {
    let item = apply(&state, |data| settings::create_menu_item(data, input)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_menu_item(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
    Json(input): Json<MenuItemInput>,
) -> Result<Json<MenuItem>, AppError> {
    Ok(Json(apply(&state, |data| settings::update_menu_item(data, id, input)).await?))
}

pub async fn deactivate_menu_item(
    State(state): State<AppState>,
    _guard: OperatorGuard,
    Path(id): Path<Uuid>,
) -> Result<Json<MenuItem>, AppError> {
    Ok(Json(apply(&state, |data| settings::deactivate_menu_item(data, id)).await?))
}
