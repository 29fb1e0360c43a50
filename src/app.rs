use crate::handlers::{loyalty, operator, orders, settings, storefront};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(storefront::index))
        .route("/assets/style.css", get(storefront::style))
        .route("/orders/:id", get(orders::order_page))
        .route("/api/menu", get(storefront::get_menu))
        .route("/api/locations", get(storefront::get_locations))
        .route("/api/banners", get(storefront::get_banners))
        .route("/api/cart/quote", post(storefront::quote_cart))
        .route("/api/checkout", post(orders::checkout))
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/events", get(orders::order_events))
        .route("/api/customers/:customer_id/orders", get(orders::customer_orders))
        .route("/api/payments/webhook", post(orders::payment_webhook))
        .route("/api/loyalty/rewards", get(loyalty::list_rewards))
        .route("/api/loyalty/:customer_id", get(loyalty::get_summary))
        .route("/api/loyalty/:customer_id/ledger", get(loyalty::get_ledger))
        .route("/api/loyalty/:customer_id/coupons", post(loyalty::activate_reward))
        .route("/api/operator/login", post(operator::login))
        .route("/api/operator/logout", post(operator::logout))
        .route("/api/operator/orders", get(operator::list_orders))
        .route("/api/operator/orders/:id/status", post(operator::update_status))
        .route("/api/operator/stats", get(operator::get_stats))
        .route(
            "/api/operator/loyalty/:customer_id/adjust",
            post(operator::adjust_points),
        )
        .route(
            "/api/operator/settings/locations",
            get(settings::list_locations).post(settings::create_location),
        )
        .route(
            "/api/operator/settings/locations/:id",
            put(settings::update_location).delete(settings::deactivate_location),
        )
        .route(
            "/api/operator/settings/promos",
            get(settings::list_promos).post(settings::create_promo),
        )
        .route(
            "/api/operator/settings/promos/:code",
            put(settings::update_promo).delete(settings::deactivate_promo),
        )
        .route(
            "/api/operator/settings/rewards",
            get(settings::list_rewards).post(settings::create_reward),
        )
        .route(
            "/api/operator/settings/rewards/:id",
            put(settings::update_reward).delete(settings::deactivate_reward),
        )
        .route(
            "/api/operator/settings/loyalty-rules",
            get(settings::get_loyalty_rules).put(settings::update_loyalty_rules),
        )
        .route(
            "/api/operator/settings/banners",
            get(settings::list_banners).post(settings::create_banner),
        )
        .route(
            "/api/operator/settings/banners/:id",
            put(settings::update_banner).delete(settings::deactivate_banner),
        )
        .route(
            "/api/operator/settings/menu",
            get(settings::list_menu).post(settings::create_menu_item),
        )
        .route(
            "/api/operator/settings/menu/:id",
            put(settings::update_menu_item).delete(settings::deactivate_menu_item),
        )
        .with_state(state)
}
