// JSON endpoints over the same search state the properties page renders

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{forms::validate_criteria, pages::PageQuery};
use crate::{
    AppState,
    error::AppResult,
    models::{DealsBody, FilterCriteria, ListingRecord, SessionUser},
    normalizer::normalize,
    search::SearchView,
    session::SessionState,
};

/// `GET /api/search[?page=N]`: the current snapshot, optionally after paging.
pub async fn get_search(State(app_state): State<AppState>, Query(query): Query<PageQuery>) -> Json<SearchView> {
    if let Some(page) = query.page {
        app_state.search.go_to_page(page).await;
    }
    Json(app_state.search.view().await)
}

pub async fn next_page(State(app_state): State<AppState>) -> Json<SearchView> {
    app_state.search.next_page().await;
    Json(app_state.search.view().await)
}

pub async fn prev_page(State(app_state): State<AppState>) -> Json<SearchView> {
    app_state.search.prev_page().await;
    Json(app_state.search.view().await)
}

pub async fn post_search(
    State(app_state): State<AppState>,
    Json(criteria): Json<FilterCriteria>,
) -> AppResult<Json<SearchView>> {
    validate_criteria(&criteria)?;
    app_state.search.apply_filters(criteria).await;
    Ok(Json(app_state.search.view().await))
}

pub async fn clear_search(State(app_state): State<AppState>) -> Json<SearchView> {
    app_state.search.clear_filters().await;
    Json(app_state.search.view().await)
}

pub async fn search_deals(State(app_state): State<AppState>, Json(body): Json<DealsBody>) -> Json<SearchView> {
    app_state.search.best_deals(body.city).await;
    Json(app_state.search.view().await)
}

/// One listing straight from the remote, normalized. Remote failures keep their status.
pub async fn get_listing(State(app_state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<ListingRecord>> {
    let raw = app_state.listings.listing(&id).await?;
    Ok(Json(normalize(&raw)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// False until the startup check has answered.
    checked: bool,
    authenticated: bool,
    user: Option<SessionUser>,
    checked_at: Option<DateTime<Utc>>,
}

pub async fn get_session(State(app_state): State<AppState>) -> Json<SessionInfo> {
    let state = app_state.session.state().await;
    let checked = state != SessionState::Unknown;
    let user = match state {
        SessionState::Authenticated(user) => Some(user),
        SessionState::Unknown | SessionState::Anonymous => None,
    };
    Json(SessionInfo {
        checked,
        authenticated: user.is_some(),
        user,
        checked_at: app_state.session.checked_at().await,
    })
}
