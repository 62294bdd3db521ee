// Route definitions

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::AppState;

mod account;
mod api;
mod auth;
mod forms;
mod pages;


pub fn create_router(app_state: AppState) -> Router {
    // JSON endpoints mirroring the search page, for scripts and the browser alike
    let api_router = Router::new()
        .route("/search", get(api::get_search).post(api::post_search))
        .route("/search/clear", post(api::clear_search))
        .route("/search/next", post(api::next_page))
        .route("/search/prev", post(api::prev_page))
        .route("/search/deals", post(api::search_deals))
        .route("/listing/:id", get(api::get_listing))
        .route("/session", get(api::get_session))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(|| async { Redirect::to("/properties") }))
        // Browsing
        .route("/properties", get(pages::properties_page))
        .route("/properties/search", post(pages::apply_filters))
        .route("/properties/clear", post(pages::clear_filters))
        .route("/properties/deals", post(pages::best_deals))
        .route("/listing/:id", get(pages::listing_page))
        .route("/listing/:id/review", post(pages::submit_review))
        // Landlord management (login required)
        .route("/manage", get(pages::manage_page))
        .route("/manage/refresh", post(pages::refresh_managed))
        .route("/manage/new", get(pages::add_property_page).post(pages::add_property))
        .route("/manage/:id/toggle", post(pages::toggle_property))
        .route("/manage/:id/edit", post(pages::edit_property))
        .route("/manage/:id/delete", post(pages::delete_property))
        // Session
        .route("/login", get(auth::login_page).post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .route("/signup", get(auth::signup_page).post(auth::handle_signup))
        // Account
        .route("/settings", get(account::settings_page).post(account::update_settings))
        .nest("/api", api_router)
        .with_state(app_state)
}
