use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    /// HS256 key for validating session tokens issued by the identity service.
    pub session_secret: String,
    /// Public application key echoed in channel authorization responses.
    pub realtime_key: String,
    /// HMAC key for signing per-socket channel authorizations.
    pub realtime_secret: String,
    /// Upper bound on a single fan-out publish; failures are logged, never fatal.
    pub publish_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| crate::error::AppError::Config("SESSION_SECRET missing".into()))?;
        let realtime_key = env::var("REALTIME_APP_KEY")
            .map_err(|_| crate::error::AppError::Config("REALTIME_APP_KEY missing".into()))?;
        let realtime_secret = env::var("REALTIME_APP_SECRET")
            .map_err(|_| crate::error::AppError::Config("REALTIME_APP_SECRET missing".into()))?;

        let publish_timeout_ms = env::var("REALTIME_PUBLISH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2000);

        Ok(Self {
            database_url,
            redis_url,
            port,
            session_secret,
            realtime_key,
            realtime_secret,
            publish_timeout_ms,
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            port: 3000,
            session_secret: "test-session-secret".into(),
            realtime_key: "test-app-key".into(),
            realtime_secret: "test-app-secret".into(),
            publish_timeout_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_distinct_secrets() {
        let config = Config::test_defaults();
        assert_ne!(config.session_secret, config.realtime_secret);
        assert_eq!(config.publish_timeout_ms, 2000);
    }
}
