use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use forum_types::models::User;

use crate::auth::AppState;
use crate::authenticator::require_identity;
use crate::error::ApiError;
use crate::settings::AuthSettings;

/// The caller as resolved from the session cookie, attached to every request.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<User>);

/// Extractor for protected handlers: rejects anonymous callers with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().cloned().unwrap_or_default();
        require_identity(identity.0).map(CurrentUser)
    }
}

/// Resolve the session cookie into an [`Identity`] before any handler runs.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = CookieJar::from_headers(req.headers())
        .get(&state.settings.cookie_name)
        .map(|c| c.value().to_string());

    let user = match token {
        None => None,
        Some(token) => {
            let st = state.clone();
            let resolved = tokio::task::spawn_blocking(move || {
                st.authenticator().resolve_identity(Some(&token))
            })
            .await
            .map_err(ApiError::from)
            .and_then(|r| r);

            match resolved {
                Ok(user) => user,
                Err(e) => return e.into_response(),
            }
        }
    };

    req.extensions_mut().insert(Identity(user));
    next.run(req).await
}

/// Session cookie mirroring the session's absolute expiry.
pub fn session_cookie(
    settings: &AuthSettings,
    token: String,
    expires_at: DateTime<Utc>,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((settings.cookie_name.clone(), token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.cookie_secure)
        .path("/")
        .build();

    if let Ok(expires) = time::OffsetDateTime::from_unix_timestamp(expires_at.timestamp()) {
        cookie.set_expires(expires);
    }
    cookie
}

/// Cookie that makes the browser drop the session cookie.
pub fn removal_cookie(settings: &AuthSettings) -> Cookie<'static> {
    Cookie::build((settings.cookie_name.clone(), ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.cookie_secure)
        .path("/")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn session_cookie_attributes() {
        let settings = AuthSettings::default();
        let expires_at = Utc::now() + Duration::hours(24);
        let cookie = session_cookie(&settings, "tok".into(), expires_at);

        assert_eq!(cookie.name(), "forum_session");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.expires_datetime().map(|t| t.unix_timestamp()),
            Some(expires_at.timestamp())
        );
    }
}
