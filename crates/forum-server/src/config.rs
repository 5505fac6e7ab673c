use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

use forum_api::oauth::ProviderSettings;
use forum_api::oauth::provider::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL};
use forum_api::password::HashCost;
use forum_api::settings::AuthSettings;
use forum_db::users::UsernameBounds;

/// Process configuration, read once at startup from `FORUM_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub auth: AuthSettings,
    pub hash_cost: HashCost,
    pub provider: ProviderSettings,
    pub sweep_interval_secs: u64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset and empty values take
    /// the default; set values that fail to parse are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let host = var("FORUM_HOST", "0.0.0.0");
        let port: u16 = parse(&var("FORUM_PORT", "8080"), "FORUM_PORT")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let ttl_secs: i64 = parse(&var("FORUM_SESSION_TTL_SECS", "86400"), "FORUM_SESSION_TTL_SECS")?;
        anyhow::ensure!(ttl_secs > 0, "FORUM_SESSION_TTL_SECS must be positive");

        let username = UsernameBounds {
            min: parse(&var("FORUM_USERNAME_MIN", "5"), "FORUM_USERNAME_MIN")?,
            max: parse(&var("FORUM_USERNAME_MAX", "15"), "FORUM_USERNAME_MAX")?,
        };
        anyhow::ensure!(
            username.min > 0 && username.min <= username.max,
            "username bounds {}..={} are not a valid range",
            username.min,
            username.max
        );

        let auth = AuthSettings {
            cookie_name: var("FORUM_SESSION_COOKIE", "forum_session"),
            cookie_secure: parse(&var("FORUM_COOKIE_SECURE", "false"), "FORUM_COOKIE_SECURE")?,
            session_ttl: chrono::Duration::seconds(ttl_secs),
            username,
            password_min: parse(&var("FORUM_PASSWORD_MIN", "8"), "FORUM_PASSWORD_MIN")?,
            password_max: parse(&var("FORUM_PASSWORD_MAX", "64"), "FORUM_PASSWORD_MAX")?,
        };
        anyhow::ensure!(
            auth.password_min <= auth.password_max,
            "FORUM_PASSWORD_MIN exceeds FORUM_PASSWORD_MAX"
        );

        let hash_cost = HashCost {
            memory_kib: parse(&var("FORUM_HASH_MEMORY_KIB", "19456"), "FORUM_HASH_MEMORY_KIB")?,
            iterations: parse(&var("FORUM_HASH_ITERATIONS", "2"), "FORUM_HASH_ITERATIONS")?,
            parallelism: parse(&var("FORUM_HASH_PARALLELISM", "1"), "FORUM_HASH_PARALLELISM")?,
        };

        let mut provider = ProviderSettings::google(
            var("FORUM_OAUTH_CLIENT_ID", ""),
            var("FORUM_OAUTH_CLIENT_SECRET", ""),
            var(
                "FORUM_OAUTH_REDIRECT_URL",
                &format!("http://localhost:{}/api/auth/google/callback", port),
            ),
        );
        provider.auth_url = var("FORUM_OAUTH_AUTH_URL", GOOGLE_AUTH_URL);
        provider.token_url = var("FORUM_OAUTH_TOKEN_URL", GOOGLE_TOKEN_URL);
        provider.userinfo_url = var("FORUM_OAUTH_USERINFO_URL", GOOGLE_USERINFO_URL);

        let sweep_interval_secs: u64 =
            parse(&var("FORUM_SWEEP_INTERVAL_SECS", "300"), "FORUM_SWEEP_INTERVAL_SECS")?;
        anyhow::ensure!(sweep_interval_secs > 0, "FORUM_SWEEP_INTERVAL_SECS must be positive");

        let allowed_origins = var("FORUM_ALLOWED_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            addr,
            db_path: var("FORUM_DB_PATH", "forum.db").into(),
            auth,
            hash_cost,
            provider,
            sweep_interval_secs,
            allowed_origins,
        })
    }
}

fn parse<T>(raw: &str, key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} has invalid value {:?}", key, raw))
}
