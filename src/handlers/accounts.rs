//! Sign-in and sign-out pages.

use std::sync::Arc;

use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tera::Context;
use validator::Validate;

use crate::{
    AppState,
    auth::{issue_tokens, verify_password},
    errors::{AppResult, found},
    forms::LoginForm,
    middleware_auth::{with_session, without_session},
};

const LOGIN_FAILED: &str = "Please enter a correct username and password.";
const DEFAULT_LANDING: &str = "/catalog/";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

fn render_login(
    state: &AppState,
    error: Option<&str>,
    next: &str,
    username: &str,
) -> AppResult<Html<String>> {
    let mut ctx = Context::new();
    ctx.insert("error", &error);
    ctx.insert("next", next);
    ctx.insert("username", username);
    state.templates.render("registration/login.html", ctx)
}

/// Only same-site absolute paths are followed after sign-in.
///
/// Browsers read `\` as `/`, so `/\host` is as offsite as `//host`.
fn landing(next: &str) -> &str {
    let local = next
        .strip_prefix('/')
        .is_some_and(|rest| !rest.starts_with(['/', '\\']))
        && !next.chars().any(|c| c == '\\' || c.is_ascii_control());
    if local { next } else { DEFAULT_LANDING }
}

/// # Errors
/// Returns template errors.
pub async fn login_form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NextQuery>,
) -> AppResult<Html<String>> {
    render_login(&state, None, &query.next, "")
}

/// Check the credentials, set the session cookies and go to `next`.
///
/// # Errors
/// Returns database or token errors.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let user = if form.validate().is_ok() {
        state.catalog.find_user_by_username(&form.username).await?
    } else {
        None
    };

    let verified = match user {
        Some(user) if verify_password(&form.password, &user.password_hash)? => Some(user),
        _ => None,
    };

    let Some(user) = verified else {
        tracing::info!(username = %form.username, "login failed");
        let page = render_login(&state, Some(LOGIN_FAILED), &form.next, &form.username)?;
        return Ok(page.into_response());
    };

    let tokens = issue_tokens(user.id, &state.config)?;
    tracing::info!(user = %user.username, "signed in");
    Ok((with_session(jar, tokens), found(landing(&form.next))).into_response())
}

/// # Errors
/// Never fails; the signature matches the other handlers.
#[allow(clippy::unused_async)]
pub async fn logout(jar: CookieJar) -> AppResult<Response> {
    Ok((without_session(jar), found("/accounts/login/")).into_response())
}
