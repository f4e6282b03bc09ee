use anyhow::{Context, Result};

/// Process-wide configuration, read from the environment once at startup and
/// carried immutably inside the application state.
#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub token_ttl_minutes: i64,
    pub db_path: String,
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` or empty means permissive.
    pub cors_origins: Vec<String>,
    /// Base URL used when composing password-reset links.
    pub frontend_url: String,
    /// Mail relay credentials; `None` disables real delivery and activates
    /// the console/link development fallback.
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STUDY_SECRET_KEY")
            .unwrap_or_else(|_| "dev-secret-change-me".into());
        let token_ttl_minutes = match std::env::var("STUDY_TOKEN_TTL_MINUTES") {
            Ok(raw) => raw
                .parse()
                .context("STUDY_TOKEN_TTL_MINUTES must be an integer")?,
            Err(_) => 30,
        };
        let db_path = std::env::var("STUDY_DB_PATH").unwrap_or_else(|_| "study.db".into());
        let host = std::env::var("STUDY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("STUDY_PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .context("STUDY_PORT must be a port number")?;

        let cors_origins = std::env::var("STUDY_CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != "*")
            .collect();

        let frontend_url = std::env::var("STUDY_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        let mail = match (
            std::env::var("STUDY_MAIL_API_URL"),
            std::env::var("STUDY_MAIL_API_KEY"),
        ) {
            (Ok(api_url), Ok(api_key)) => Some(MailConfig {
                api_url,
                api_key,
                from: std::env::var("STUDY_MAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@study-together.local".into()),
            }),
            _ => None,
        };

        Ok(Self {
            secret_key,
            token_ttl_minutes,
            db_path,
            host,
            port,
            cors_origins,
            frontend_url,
            mail,
        })
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.frontend_url.trim_end_matches('/'),
            token
        )
    }
}
