use askama::Template;
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::{
    forms::{Choice, LoginForm, SignupForm, gender_choices, safe_redirect},
    pages::{current_username, render},
};
use crate::{
    AppState,
    error::{AppError, AppResult},
    models::Credentials,
};

const LOGIN_NETWORK_ERROR: &str = "Could not reach the server. Please try again.";
const SIGNUP_NETWORK_ERROR: &str = "Network error";

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    username: Option<String>,
    /// Set after a successful signup.
    notice: Option<String>,
    redirect: String,
    entered_username: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
    pub signed_up: Option<String>,
}

// Handler for GET /login
pub async fn login_page(
    State(app_state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> AppResult<Response> {
    let template = LoginTemplate {
        username: current_username(&app_state).await,
        notice: query
            .signed_up
            .is_some()
            .then(|| "Account created. Log in to continue.".to_string()),
        redirect: safe_redirect(query.redirect.as_deref()).to_string(),
        entered_username: String::new(),
        error: None,
    };
    Ok(render(&template, "login")?.into_response())
}

// Handler for POST /login
pub async fn handle_login(
    State(app_state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let target = safe_redirect(form.redirect.as_deref()).to_string();
    let credentials = Credentials { username: form.username.trim().to_string(), password: form.password };

    match app_state.session.login(&credentials).await {
        Ok(user) => {
            // Whatever the previous user had loaded is not theirs
            app_state.manager.reset().await;
            tracing::info!(user_id = user.user_id, redirect = %target, "Login succeeded");
            Ok(Redirect::to(&target).into_response())
        }
        Err(e) => {
            tracing::warn!(username = %credentials.username, error = %e, "Login failed");
            let template = LoginTemplate {
                username: None,
                notice: None,
                redirect: target,
                entered_username: credentials.username,
                error: Some(e.user_message(LOGIN_NETWORK_ERROR)),
            };
            Ok((StatusCode::UNAUTHORIZED, render(&template, "login")?).into_response())
        }
    }
}

// Handler for POST /logout
pub async fn handle_logout(State(app_state): State<AppState>) -> Redirect {
    app_state.session.logout().await;
    app_state.manager.reset().await;
    Redirect::to("/properties")
}

#[derive(Template)]
#[template(path = "signup.html")]
struct SignupTemplate {
    username: Option<String>,
    form: SignupForm,
    genders: Vec<Choice>,
    error: Option<String>,
}

impl SignupTemplate {
    fn new(username: Option<String>, form: SignupForm, error: Option<String>) -> Self {
        let genders = gender_choices(&form.gender, "Prefer not to say");
        SignupTemplate { username, form, genders, error }
    }
}

// Handler for GET /signup
pub async fn signup_page(State(app_state): State<AppState>) -> AppResult<Response> {
    let template = SignupTemplate::new(current_username(&app_state).await, SignupForm::blank(), None);
    Ok(render(&template, "signup")?.into_response())
}

// Handler for POST /signup
pub async fn handle_signup(
    State(app_state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let username = current_username(&app_state).await;
    let body = match form.body() {
        Ok(body) => body,
        Err(AppError::BadRequest(message)) => {
            let template = SignupTemplate::new(username, form.without_passwords(), Some(message));
            return Ok((StatusCode::BAD_REQUEST, render(&template, "signup")?).into_response());
        }
        Err(e) => return Err(e),
    };

    match app_state.accounts.signup(&body).await {
        Ok(()) => {
            tracing::info!(username = %body.username, user_type = ?body.user_type, "Account created");
            Ok(Redirect::to("/login?signed_up=1").into_response())
        }
        Err(e) => {
            tracing::warn!(username = %body.username, error = %e, "Signup failed");
            let message = Some(e.user_message(SIGNUP_NETWORK_ERROR));
            let template = SignupTemplate::new(username, form.without_passwords(), message);
            Ok((e.status(), render(&template, "signup")?).into_response())
        }
    }
}
