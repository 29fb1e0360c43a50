use super::local_now;
use crate::cart::Quote;
use crate::checkout::{self, QuoteRequest};
use crate::errors::AppError;
use crate::models::{Banner, Location, MenuItem};
use crate::state::AppState;
use crate::ui::{render_menu, stylesheet};
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use chrono::Utc;
use serde::Serialize;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let now = Utc::now();
    let data = state.data.lock().await;
    let banners = visible_banners(data.banners.values(), now);
    let menu = data.menu.values();
    let locations = data.locations.values().filter(|location| location.active);
    Html(render_menu(banners, menu, locations))
}

pub async fn style() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], stylesheet())
}

/// Menu grouped the way the storefront shows it: by category, then position.
pub async fn get_menu(State(state): State<AppState>) -> Json<Vec<MenuItem>> {
    let data = state.data.lock().await;
    let mut menu: Vec<MenuItem> = data.menu.values().cloned().collect();
    menu.sort_by(|a, b| {
        (a.category.as_str(), a.sort_order, a.name.as_str())
            .cmp(&(b.category.as_str(), b.sort_order, b.name.as_str()))
    });
    Json(menu)
}

#[derive(Debug, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: Location,
    pub open_now: bool,
}

pub async fn get_locations(State(state): State<AppState>) -> Json<Vec<LocationView>> {
    let now = local_now();
    let data = state.data.lock().await;
    let locations = data
        .locations
        .values()
        .filter(|location| location.active)
        .map(|location| LocationView {
            open_now: location.is_open_at(now),
            location: location.clone(),
        })
        .collect();
    Json(locations)
}

fn visible_banners<'a>(
    banners: impl Iterator<Item = &'a Banner>,
    now: chrono::DateTime<Utc>,
) -> Vec<&'a Banner> {
    let mut visible: Vec<&Banner> = banners.filter(|banner| banner.is_visible_at(now)).collect();
    visible.sort_by_key(|banner| banner.sort_order);
    visible
}

pub async fn get_banners(State(state): State<AppState>) -> Json<Vec<Banner>> {
    let data = state.data.lock().await;
    let banners = visible_banners(data.banners.values(), Utc::now())
        .into_iter()
        .cloned()
        .collect();
    Json(banners)
}

pub async fn quote_cart(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    let data = state.data.lock().await;
    let quote = checkout::quote(&data, &request, Utc::now())?;
    Ok(Json(quote))
}
