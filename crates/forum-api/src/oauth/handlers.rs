use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use forum_types::api::{
    OAuthCallbackQuery, OAuthCallbackResponse, OAuthLoginResponse, OAuthStatusResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::session_cookie;
use crate::oauth::StateError;

/// GET /api/auth/google/login: hand out a consent URL bound to a fresh state.
pub async fn login(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let swept = state.oauth_states.sweep_expired();
    if swept > 0 {
        debug!("Swept {} expired OAuth states", swept);
    }

    let token = state.oauth_states.issue();
    let authorization_url = state.oauth_provider.authorization_url(&token)?;

    Ok(Json(OAuthLoginResponse {
        authorization_url,
        state: token,
    }))
}

/// GET /api/auth/google/callback: consume the state, exchange the code,
/// resolve the user and start a session.
pub async fn callback(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<OAuthCallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(error) = query.error {
        warn!("OAuth login cancelled or refused by provider: {}", error);
        return Err(ApiError::Validation("OAuth login was cancelled".into()));
    }

    let state_token = query.state.filter(|s| !s.is_empty()).ok_or(ApiError::StateInvalid)?;
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("missing authorization code".into()))?;

    // Consume before any outbound call: a replayed callback fails here.
    state.oauth_states.consume(&state_token).map_err(|e| {
        match e {
            StateError::NotFound => debug!("Unknown or already used OAuth state"),
            StateError::Expired => debug!("Expired OAuth state"),
        }
        ApiError::StateInvalid
    })?;

    let access_token = state.oauth_provider.exchange_code(&code).await?;
    let profile = state.oauth_provider.fetch_profile(&access_token).await?;

    let st = state.clone();
    let client_addr = addr.to_string();
    let (user, session, is_new_user) = tokio::task::spawn_blocking(move || {
        st.authenticator().oauth_login(&profile, Some(&client_addr))
    })
    .await??;

    let cookie = session_cookie(&state.settings, session.token.clone(), session.expires_at);
    Ok((
        jar.add(cookie),
        Json(OAuthCallbackResponse {
            user,
            session_token: session.token,
            is_new_user,
        }),
    ))
}

/// GET /api/auth/oauth/status
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(OAuthStatusResponse {
        oauth_enabled: state.oauth_provider.is_configured(),
        providers: vec![state.oauth_provider.name().to_string()],
    })
}
