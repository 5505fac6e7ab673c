use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use forum_types::models::ProviderProfile;

/// Bound on each outbound call to the identity provider. Not retried.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success response. The body is kept verbatim for the logs.
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unusable provider response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Name stored in `users.provider`.
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl ProviderSettings {
    pub fn google(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            name: "google".to_string(),
            client_id,
            client_secret,
            redirect_url,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: String,
    email: String,
    #[serde(default)]
    name: String,
}

/// Authorization-code exchange against one OAuth2 provider.
pub struct ProviderClient {
    http: Client,
    settings: ProviderSettings,
}

impl ProviderClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(PROVIDER_TIMEOUT).build()?;
        Ok(Self { http, settings })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Whether client credentials were supplied at all.
    pub fn is_configured(&self) -> bool {
        !self.settings.client_id.is_empty() && !self.settings.client_secret.is_empty()
    }

    /// Consent page URL carrying `state`.
    pub fn authorization_url(&self, state: &str) -> Result<String, ProviderError> {
        let url = Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_url.as_str()),
                ("scope", "openid email profile"),
                ("response_type", "code"),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ProviderError::Malformed(format!("authorization URL: {e}")))?;
        Ok(url.into())
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(&self.settings.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.settings.redirect_url.as_str()),
            ])
            .send()
            .await?;

        let token: TokenResponse = read_json(response).await?;
        Ok(token.access_token)
    }

    pub async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .http
            .get(&self.settings.userinfo_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let info: UserInfo = read_json(response).await?;
        if info.id.is_empty() || info.email.is_empty() {
            return Err(ProviderError::Malformed("userinfo without id or email".into()));
        }

        info!("Fetched {} profile for provider id {}", self.settings.name, info.id);
        Ok(ProviderProfile {
            provider: self.settings.name.clone(),
            provider_id: info.id,
            email: info.email,
            name: info.name,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ProviderClient {
        ProviderClient::new(ProviderSettings::google(
            "client-123".into(),
            "secret".into(),
            "http://localhost:8080/api/auth/google/callback".into(),
        ))
        .unwrap()
    }

    #[test]
    fn authorization_url_carries_state_and_client() {
        let url = Url::parse(&client().authorization_url("st@te/1").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["state"], "st@te/1");
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:8080/api/auth/google/callback"
        );
    }

    #[test]
    fn provider_name_defaults_to_google() {
        assert_eq!(client().name(), "google");
    }

    #[test]
    fn missing_credentials_are_reported() {
        assert!(client().is_configured());
        let bare = ProviderClient::new(ProviderSettings::google(
            String::new(),
            String::new(),
            "http://localhost:8080/api/auth/google/callback".into(),
        ))
        .unwrap();
        assert!(!bare.is_configured());
    }
}
