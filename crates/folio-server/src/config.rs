use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Server settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub operator_email: String,
    pub operator_name: String,
    /// Email API endpoint; unset means emails are only logged
    pub email_api_url: Option<String>,
    pub email_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("FOLIO_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FOLIO_JWT_SECRET is unset or still a placeholder");
        }

        let operator_email = get("FOLIO_OPERATOR_EMAIL")
            .filter(|v| !v.trim().is_empty())
            .context("FOLIO_OPERATOR_EMAIL must name the operator account")?;
        let operator_name = get("FOLIO_OPERATOR_NAME").unwrap_or_else(|| "Folio".into());

        let host = get("FOLIO_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("FOLIO_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("FOLIO_PORT is not a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("FOLIO_HOST is not an IP address")?;

        let email_api_url = get("FOLIO_EMAIL_API_URL").filter(|v| !v.trim().is_empty());
        let email_api_key = get("FOLIO_EMAIL_API_KEY").unwrap_or_default();
        if email_api_url.is_some() && email_api_key.is_empty() {
            bail!("FOLIO_EMAIL_API_KEY is required when FOLIO_EMAIL_API_URL is set");
        }

        Ok(Self {
            jwt_secret,
            db_path: get("FOLIO_DB_PATH").unwrap_or_else(|| "folio.db".into()).into(),
            addr,
            operator_email,
            operator_name,
            email_api_url,
            email_api_key,
        })
    }
}
