// Signed-in user's own settings

use askama::Template;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{
    forms::{Choice, SettingsForm, gender_choices},
    pages::render,
};
use crate::{
    AppState,
    error::{AppError, AppResult},
    normalizer::normalize_settings,
    session::AuthenticatedUser,
};

const SETTINGS_NETWORK_ERROR: &str = "Network error";

#[derive(Template)]
#[template(path = "settings.html")]
struct SettingsTemplate {
    username: Option<String>,
    /// None when the settings could not be loaded; nothing to edit then.
    form: Option<SettingsForm>,
    genders: Vec<Choice>,
    saved: Option<String>,
    error: Option<String>,
}

impl SettingsTemplate {
    fn new(username: String, form: Option<SettingsForm>) -> Self {
        let selected = form.as_ref().map(|f| f.gender_preferred.as_str()).unwrap_or("?");
        SettingsTemplate {
            username: Some(username),
            genders: gender_choices(selected, "No preference"),
            form,
            saved: None,
            error: None,
        }
    }
}

// Handler for GET /settings
pub async fn settings_page(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Response> {
    match app_state.accounts.settings().await {
        Ok(raw) => {
            let settings = normalize_settings(&raw);
            tracing::debug!(role = ?settings.role, "Settings loaded");
            let template = SettingsTemplate::new(user.username, Some(SettingsForm::from_settings(&settings)));
            Ok(render(&template, "settings")?.into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load settings");
            let mut template = SettingsTemplate::new(user.username, None);
            template.error = Some(e.user_message(SETTINGS_NETWORK_ERROR));
            Ok((e.status(), render(&template, "settings")?).into_response())
        }
    }
}

// Handler for POST /settings
pub async fn update_settings(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<SettingsForm>,
) -> AppResult<Response> {
    let outcome = match form.update() {
        Ok(update) => app_state.accounts.update_settings(&update).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to update settings");
            e
        }),
        Err(AppError::BadRequest(message)) => {
            let mut template = SettingsTemplate::new(user.username, Some(form));
            template.error = Some(message);
            return Ok((StatusCode::BAD_REQUEST, render(&template, "settings")?).into_response());
        }
        Err(e) => return Err(e),
    };

    match outcome {
        Ok(()) => {
            tracing::info!(user_id = user.user_id, "Settings saved");
            let mut template = SettingsTemplate::new(user.username, Some(form));
            template.saved = Some("Settings saved.".to_string());
            Ok(render(&template, "settings")?.into_response())
        }
        Err(e) => {
            let mut template = SettingsTemplate::new(user.username, Some(form));
            template.error = Some(e.user_message(SETTINGS_NETWORK_ERROR));
            Ok((e.status(), render(&template, "settings")?).into_response())
        }
    }
}
