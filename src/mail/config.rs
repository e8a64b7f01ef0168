use std::env;
use std::time::Duration;

use super::MailError;

fn env_required(key: &str) -> Result<String, MailError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| MailError::Config(format!("{key} is required")))
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

/// Relay settings, read from the environment for every dispatch.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub password: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from", &self.from)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SmtpConfig {
    /// Reads `SMTP_SERV`, `SMTP_PORT`, `FROM`, `PASS` and optional `SMTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, MailError> {
        let host = env_required("SMTP_SERV")?;
        let port = parse_port(&env_required("SMTP_PORT")?)?;
        let from = env_required("FROM")?;
        let password = env_required("PASS")?;

        Ok(Self {
            host,
            port,
            from,
            password,
            timeout: env_duration_secs("SMTP_TIMEOUT_SECS", 10),
        })
    }
}

/// Accepts both `587` and the `:587` form used by address-suffix style configs.
pub fn parse_port(raw: &str) -> Result<u16, MailError> {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(':')
        .unwrap_or(trimmed)
        .parse::<u16>()
        .map_err(|_| MailError::Config(format!("invalid SMTP_PORT '{raw}'")))
}
