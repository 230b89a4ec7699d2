use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// `development` echoes verification tokens back to the caller.
    pub environment: String,
    pub public_api_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nutriplan".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nutriplan-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");

        Ok(Self {
            database_url,
            jwt,
            environment: std::env::var("API_ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            public_api_base_url: std::env::var("PUBLIC_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".into()),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
