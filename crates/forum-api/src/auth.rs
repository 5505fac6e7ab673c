use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;

use forum_db::Database;
use forum_types::api::{LoginRequest, LoginResponse, RegisterRequest};

use crate::authenticator::Authenticator;
use crate::error::ApiError;
use crate::middleware::{CurrentUser, removal_cookie, session_cookie};
use crate::oauth::{OAuthStateStore, ProviderClient};
use crate::password::PasswordHasher;
use crate::settings::AuthSettings;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub hasher: PasswordHasher,
    pub settings: AuthSettings,
    pub oauth_states: OAuthStateStore,
    pub oauth_provider: ProviderClient,
}

impl AppStateInner {
    pub fn authenticator(&self) -> Authenticator<'_> {
        Authenticator::new(&self.db, &self.hasher, &self.settings)
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Argon2 and SQLite both block; keep them off the async workers.
    let st = state.clone();
    let user = tokio::task::spawn_blocking(move || st.authenticator().register(&req)).await??;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let client_addr = addr.to_string();
    let (user, session) = tokio::task::spawn_blocking(move || {
        st.authenticator()
            .login(&req.email, &req.password, Some(&client_addr))
    })
    .await??;

    let cookie = session_cookie(&state.settings, session.token, session.expires_at);
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user,
            expires_at: session.expires_at,
        }),
    ))
}

/// Ends the caller's session if there is one. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = jar.get(&state.settings.cookie_name).map(|c| c.value().to_string()) {
        let st = state.clone();
        tokio::task::spawn_blocking(move || st.authenticator().logout(&token)).await??;
    }

    Ok((jar.remove(removal_cookie(&state.settings)), StatusCode::NO_CONTENT))
}

pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(user)
}
