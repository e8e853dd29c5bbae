pub mod cleanup;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use hoopers_api::auth::{self, AppState};
use hoopers_api::middleware::require_auth;
use hoopers_api::{courts, games, notifications, posts, profiles, reports, runs, shop, squads};

/// Build the full router: a handful of public endpoints plus the
/// JWT-protected API. Kept out of `main` so tests can drive it in-process.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/username-available", get(auth::username_available))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/account", delete(auth::delete_account))
        // profiles
        .route("/profiles", get(profiles::list_profiles))
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/profiles/{id}", put(profiles::update_profile))
        .route("/profiles/{id}/follow", post(profiles::follow))
        .route("/profiles/{id}/follow", delete(profiles::unfollow))
        .route("/profiles/{id}/followers", get(profiles::followers))
        .route("/profiles/{id}/following", get(profiles::following))
        .route("/profiles/{id}/runs", get(runs::profile_runs))
        .route("/profiles/{id}/squads", get(squads::profile_squads))
        .route("/profiles/{id}/games", get(games::profile_games))
        .route("/profiles/{id}/reports", post(reports::create_report))
        .route("/profiles/{id}/reports", get(reports::list_reports))
        .route("/profiles/{id}/reports/summary", get(reports::report_summary))
        // posts
        .route("/posts", post(posts::create_post))
        .route("/posts", get(posts::feed))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/posts/mentions/{profile_id}", get(posts::mentioned_feed))
        .route("/posts/{id}/comments", post(posts::add_comment))
        .route("/posts/{id}/comments", get(posts::list_comments))
        .route("/posts/{id}/like", put(posts::toggle_like))
        .route("/posts/{id}/rating", put(posts::rate_post))
        .route("/comments/{id}", delete(posts::delete_comment))
        // courts
        .route("/courts", post(courts::create_court))
        .route("/courts", get(courts::list_courts))
        .route("/courts/{id}", get(courts::get_court))
        .route("/courts/{id}", put(courts::update_court))
        .route("/courts/{id}", delete(courts::delete_court))
        // runs
        .route("/runs", post(runs::create_run))
        .route("/runs", get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run))
        .route("/runs/{id}", put(runs::update_run))
        .route("/runs/{id}", delete(runs::delete_run))
        .route("/runs/{id}/invites", post(runs::invite))
        .route("/runs/{id}/rsvp", put(runs::rsvp))
        // squads
        .route("/squads", post(squads::create_squad))
        .route("/squads", get(squads::list_squads))
        .route("/squads/{id}", get(squads::get_squad))
        .route("/squads/{id}", put(squads::update_squad))
        .route("/squads/{id}", delete(squads::delete_squad))
        .route("/squads/{id}/members", post(squads::add_member))
        .route("/squads/{id}/members/{profile_id}", delete(squads::remove_member))
        // games
        .route("/games", post(games::record_game))
        .route("/games", get(games::list_games))
        .route("/games/{id}", get(games::get_game))
        // scouting reports
        .route("/reports/{id}", delete(reports::delete_report))
        // notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete_notification))
        .route("/push/subscriptions", put(notifications::upsert_push_subscription))
        .route("/push/subscriptions", delete(notifications::remove_push_subscription))
        // shop
        .route("/products", post(shop::create_product))
        .route("/products", get(shop::list_products))
        .route("/products/{id}", get(shop::get_product))
        .route("/products/{id}", put(shop::update_product))
        .route("/products/{id}", delete(shop::retire_product))
        .route("/orders", post(shop::place_order))
        .route("/orders", get(shop::list_orders))
        .route("/orders/{id}", get(shop::get_order))
        .route("/orders/{id}/status", put(shop::update_order_status))
        .route("/subscriptions", post(shop::start_subscription))
        .route("/subscriptions/current", get(shop::current_subscription))
        .route("/subscriptions/{id}", delete(shop::cancel_subscription))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}
