use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};

use crate::{
    AppState,
    auth::{REFRESH_COOKIE, SESSION_COOKIE, SessionTokens, decode_token, issue_tokens},
    errors::{AppError, AppResult},
    models::{Permission, User},
};

/// The signed-in user, placed in request extensions by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// # Errors
    /// [`AppError::Forbidden`] when the user lacks `perm`.
    pub fn require(&self, perm: Permission) -> AppResult<()> {
        if self.0.has_perm(perm) {
            Ok(())
        } else {
            tracing::debug!(user = %self.0.username, perm = perm.as_str(), "permission denied");
            Err(AppError::Forbidden)
        }
    }
}

fn cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Store freshly issued tokens in the browser.
#[must_use]
pub fn with_session(jar: CookieJar, tokens: SessionTokens) -> CookieJar {
    jar.add(cookie(SESSION_COOKIE, tokens.access))
        .add(cookie(REFRESH_COOKIE, tokens.refresh))
}

/// Forget the signed-in user.
#[must_use]
pub fn without_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

fn access_token<'a>(req: &'a Request<Body>, jar: &'a CookieJar) -> Option<&'a str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| jar.get(SESSION_COOKIE).map(Cookie::value))
}

/// Resolve the signed-in user from an access token (bearer header or cookie).
///
/// An expired access token is replaced using the refresh cookie. Anonymous
/// requests are sent to the login page with the current path as `next`.
///
/// # Errors
/// Returns `LoginRequired`, `RateLimited`, or database errors.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let next_path = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), |pq| pq.as_str().to_string());
    let login_required = || AppError::LoginRequired {
        next: next_path.clone(),
    };

    let access = access_token(&req, &jar).and_then(|t| decode_token(t, &state.config).ok());
    let (user_id, renewed) = match access {
        Some(claims) if !claims.refresh => (claims.sub, None),
        _ => {
            let refresh = jar
                .get(REFRESH_COOKIE)
                .and_then(|c| decode_token(c.value(), &state.config).ok())
                .filter(|claims| claims.refresh)
                .ok_or_else(login_required)?;
            tracing::debug!(user_id = %refresh.sub, "access token renewed from refresh cookie");
            (refresh.sub, Some(issue_tokens(refresh.sub, &state.config)?))
        }
    };

    let user = state
        .catalog
        .find_user(user_id)
        .await?
        .ok_or_else(login_required)?;

    if state.rate_limiter.check_key(&user.id.to_string()).is_err() {
        tracing::warn!(user = %user.username, "rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    req.extensions_mut().insert(CurrentUser(user));
    let response = next.run(req).await;

    Ok(match renewed {
        Some(tokens) => (with_session(jar, tokens), response).into_response(),
        None => response,
    })
}
