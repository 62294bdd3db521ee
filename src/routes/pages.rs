// HTML pages: property search, listing detail and landlord management

use askama::Template;
use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use url::form_urlencoded;

use super::forms::{DealsForm, EditForm, FilterForm, PropertyForm, ReviewForm};
use crate::{
    AppState,
    error::{ApiError, AppError, AppResult, login_target},
    manage::ManageError,
    models::ListingRecord,
    normalizer::normalize,
    search::{ListingPosition, SearchPhase, SearchView},
    session::AuthenticatedUser,
};

const REVIEW_NETWORK_ERROR: &str = "Could not submit review (network error).";

pub(super) fn render<T: Template>(template: &T, name: &str) -> AppResult<Html<String>> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render {} template: {}", name, e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}

pub(super) async fn current_username(app_state: &AppState) -> Option<String> {
    app_state.session.current_user().await.map(|user| user.username)
}

// --- Properties ---

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[derive(Template)]
#[template(path = "properties.html")]
struct PropertiesTemplate {
    username: Option<String>,
    form: FilterForm,
    heading: String,
    status_line: String,
    error: Option<String>,
    records: Vec<ListingRecord>,
    prev_page: Option<usize>,
    next_page: Option<usize>,
}

impl PropertiesTemplate {
    fn new(view: SearchView, username: Option<String>) -> Self {
        let summary = view.summary;
        PropertiesTemplate {
            username,
            form: FilterForm::from_criteria(&view.criteria),
            heading: match &view.deals_scope {
                Some(scope) => format!("Best deals in {}", scope),
                None => "Browse Properties".to_string(),
            },
            status_line: status_line(&view),
            prev_page: summary.has_prev().then(|| summary.page - 1),
            next_page: summary.has_next().then(|| summary.page + 1),
            error: view.error,
            records: view.records,
        }
    }
}

fn status_line(view: &SearchView) -> String {
    let s = &view.summary;
    match view.phase {
        SearchPhase::Idle => "No properties loaded yet.".to_string(),
        SearchPhase::Loading => "Loading properties...".to_string(),
        SearchPhase::Error => String::new(),
        SearchPhase::ReadyEmpty => match &view.deals_scope {
            Some(scope) => format!("No deals found in {}.", scope),
            None => "No properties match these filters.".to_string(),
        },
        SearchPhase::ReadyWithResults => format!(
            "Showing {}-{} of {} properties (page {} of {})",
            s.start, s.end, s.total, s.page, s.total_pages
        ),
    }
}

pub async fn properties_page(
    State(app_state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    app_state.search.load_if_idle().await;
    if let Some(page) = query.page {
        let summary = app_state.search.go_to_page(page).await;
        tracing::debug!(requested = page, page = summary.page, "Page navigation");
    }
    let view = app_state.search.view().await;
    let username = current_username(&app_state).await;
    render(&PropertiesTemplate::new(view, username), "properties")
}

pub async fn apply_filters(
    State(app_state): State<AppState>,
    Form(form): Form<FilterForm>,
) -> AppResult<Redirect> {
    let criteria = form.criteria()?;
    app_state.search.apply_filters(criteria).await;
    Ok(Redirect::to("/properties"))
}

pub async fn clear_filters(State(app_state): State<AppState>) -> Redirect {
    app_state.search.clear_filters().await;
    Redirect::to("/properties")
}

pub async fn best_deals(State(app_state): State<AppState>, Form(form): Form<DealsForm>) -> Redirect {
    app_state.search.best_deals(Some(form.city)).await;
    Redirect::to("/properties")
}

// --- Listing detail ---

#[derive(Template)]
#[template(path = "listing.html")]
struct ListingTemplate {
    username: Option<String>,
    /// Id from the URL; the remote record may come back without one.
    route_id: String,
    login_href: String,
    listing: ListingRecord,
    position: Option<ListingPosition>,
    notice: Option<String>,
    review_error: Option<String>,
}

#[derive(Template)]
#[template(path = "listing_missing.html")]
struct MissingListingTemplate {
    username: Option<String>,
    id: String,
}

/// Detail from the remote, or the copy in the current result set when the
/// remote cannot provide it.
async fn load_listing(app_state: &AppState, id: &str) -> Option<ListingRecord> {
    match app_state.listings.listing(id).await {
        Ok(raw) => Some(normalize(&raw)),
        Err(e) => {
            tracing::warn!(id, error = %e, "Listing detail unavailable, using the result set");
            app_state.search.find(id).await
        }
    }
}

async fn listing_response(
    app_state: &AppState,
    id: &str,
    notice: Option<String>,
    review_error: Option<String>,
) -> AppResult<Response> {
    let username = current_username(app_state).await;
    let Some(listing) = load_listing(app_state, id).await else {
        let template = MissingListingTemplate { username, id: id.to_string() };
        return Ok((StatusCode::NOT_FOUND, render(&template, "listing_missing")?).into_response());
    };
    let position = app_state.search.position(id).await;
    let template = ListingTemplate {
        username,
        route_id: id.to_string(),
        login_href: login_target(&format!("/listing/{}", id)),
        listing,
        position,
        notice,
        review_error,
    };
    Ok(render(&template, "listing")?.into_response())
}

pub async fn listing_page(State(app_state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    listing_response(&app_state, &id, None, None).await
}

pub async fn submit_review(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Response> {
    let review = form.body()?;
    match app_state.listings.submit_review(&id, &review).await {
        Ok(()) => {
            tracing::info!(id = %id, user_id = user.user_id, stars = review.stars, "Review submitted");
            let notice = Some("Thanks! Your review was saved.".to_string());
            listing_response(&app_state, &id, notice, None).await
        }
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Review submission failed");
            let message = Some(e.user_message(REVIEW_NETWORK_ERROR));
            listing_response(&app_state, &id, None, message).await
        }
    }
}

// --- Management ---

#[derive(Debug, Deserialize)]
pub struct ManageQuery {
    pub edit: Option<String>,
    /// Id of a property just added, for the confirmation line.
    pub created: Option<String>,
}

struct EditingRow {
    id: String,
    heading: String,
    form: EditForm,
}

#[derive(Template)]
#[template(path = "manage.html")]
struct ManageTemplate {
    username: Option<String>,
    records: Vec<ListingRecord>,
    loading: bool,
    error: Option<String>,
    notice: Option<String>,
    created: Option<String>,
    editing: Option<EditingRow>,
}

pub async fn manage_page(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ManageQuery>,
) -> AppResult<Html<String>> {
    app_state.manager.load_if_idle().await;
    let view = app_state.manager.view().await;

    let editing = match query.edit {
        Some(id) => app_state.manager.find(&id).await.map(|record| EditingRow {
            id: record.id.clone(),
            heading: record.address_summary(),
            form: EditForm::from_record(&record),
        }),
        None => None,
    };

    let template = ManageTemplate {
        username: Some(user.username),
        loading: view.state.is_loading(),
        error: view.state.error().map(str::to_owned),
        records: view.state.ready().cloned().unwrap_or_default(),
        notice: view.notice,
        created: query.created,
        editing,
    };
    render(&template, "manage")
}

pub async fn refresh_managed(State(app_state): State<AppState>, _user: AuthenticatedUser) -> Redirect {
    app_state.manager.load().await;
    Redirect::to("/manage")
}

#[derive(Template)]
#[template(path = "add_property.html")]
struct AddPropertyTemplate {
    username: Option<String>,
    form: PropertyForm,
    error: Option<String>,
}

const ADD_NETWORK_ERROR: &str = "Network error";

pub async fn add_property_page(AuthenticatedUser(user): AuthenticatedUser) -> AppResult<Html<String>> {
    let template = AddPropertyTemplate { username: Some(user.username), form: PropertyForm::blank(), error: None };
    render(&template, "add_property")
}

pub async fn add_property(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<PropertyForm>,
) -> AppResult<Response> {
    let (status, error) = match form.property() {
        Ok(property) => match app_state.manager.create(&property).await {
            Ok(id) => {
                let query = form_urlencoded::Serializer::new(String::new()).append_pair("created", &id).finish();
                return Ok(Redirect::to(&format!("/manage?{}", query)).into_response());
            }
            Err(ManageError::Remote(ApiError::NotAuthenticated)) => {
                return Err(AppError::LoginRequired("/manage/new".to_string()));
            }
            Err(ManageError::Remote(e)) => (e.status(), e.user_message(ADD_NETWORK_ERROR)),
            Err(e @ ManageError::NotLoaded(_)) => (StatusCode::NOT_FOUND, e.to_string()),
        },
        Err(AppError::BadRequest(message)) => (StatusCode::BAD_REQUEST, message),
        Err(e) => return Err(e),
    };
    let template = AddPropertyTemplate { username: Some(user.username), form, error: Some(error) };
    Ok((status, render(&template, "add_property")?).into_response())
}

/// Where a toggle, edit or delete leaves the browser. Remote failures are
/// already the manager's notice and show up on /manage.
fn after_change<T>(id: &str, result: Result<T, ManageError>) -> AppResult<Redirect> {
    match result {
        Ok(_) => Ok(Redirect::to("/manage")),
        Err(ManageError::NotLoaded(_)) => Err(AppError::NotFound(format!("Property {} is not in your list", id))),
        Err(ManageError::Remote(ApiError::NotAuthenticated)) => Err(AppError::LoginRequired("/manage".to_string())),
        Err(ManageError::Remote(e)) => {
            tracing::debug!(id, error = %e, "Change failed, notice set");
            Ok(Redirect::to("/manage"))
        }
    }
}

pub async fn toggle_property(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let result = app_state.manager.toggle_availability(&id).await;
    after_change(&id, result)
}

pub async fn edit_property(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    Form(form): Form<EditForm>,
) -> AppResult<Redirect> {
    let update = form.update()?;
    let result = app_state.manager.update(&id, update).await;
    after_change(&id, result)
}

pub async fn delete_property(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let result = app_state.manager.delete(&id).await;
    after_change(&id, result)
}
