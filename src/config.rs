use chrono::Duration;
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_OPERATOR_PIN: &str = "0000";
const DEFAULT_PAYMENT_WINDOW_MINUTES: i64 = 15;
const MAX_PAYMENT_WINDOW_MINUTES: i64 = 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to hash operator PIN: {0}")]
    PinHash(#[from] bcrypt::BcryptError),
    #[error("OPERATOR_PIN must be 4 to 8 digits")]
    PinFormat,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub operator_pin_hash: String,
    pub public_base_url: String,
    pub payment_gateway_url: Option<String>,
    pub payment_webhook_secret: Option<String>,
    pub payment_window: Duration,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = try_load("PORT", 8080);
        let bcrypt_cost: u32 = try_load("BCRYPT_COST", bcrypt::DEFAULT_COST);
        let payment_window_minutes: i64 =
            try_load("PAYMENT_WINDOW_MINUTES", DEFAULT_PAYMENT_WINDOW_MINUTES);

        let operator_pin_hash = match optional("OPERATOR_PIN_HASH") {
            Some(hash) => hash,
            None => {
                let pin = optional("OPERATOR_PIN").unwrap_or_else(|| {
                    warn!("OPERATOR_PIN not set, falling back to the default PIN");
                    DEFAULT_OPERATOR_PIN.to_string()
                });
                if !valid_pin(&pin) {
                    return Err(ConfigError::PinFormat);
                }
                bcrypt::hash(pin, bcrypt_cost)?
            }
        };

        let payment_webhook_secret = optional("PAYMENT_WEBHOOK_SECRET");
        if payment_webhook_secret.is_none() {
            warn!("PAYMENT_WEBHOOK_SECRET not set, payment webhooks are unauthenticated");
        }

        Ok(Self {
            port,
            data_path: optional("APP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/store.json")),
            operator_pin_hash,
            public_base_url: optional("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            payment_gateway_url: optional("PAYMENT_GATEWAY_URL"),
            payment_webhook_secret,
            payment_window: payment_window(payment_window_minutes),
            currency: optional("CURRENCY").unwrap_or_else(|| "USD".to_string()),
        })
    }
}

/// Card payment window, falling back to the default when out of range.
pub fn payment_window(minutes: i64) -> Duration {
    let minutes = if (1..=MAX_PAYMENT_WINDOW_MINUTES).contains(&minutes) {
        minutes
    } else {
        warn!(
            "PAYMENT_WINDOW_MINUTES must be between 1 and {MAX_PAYMENT_WINDOW_MINUTES}, using default: {DEFAULT_PAYMENT_WINDOW_MINUTES}"
        );
        DEFAULT_PAYMENT_WINDOW_MINUTES
    };
    Duration::try_minutes(minutes).unwrap_or_else(|| Duration::minutes(DEFAULT_PAYMENT_WINDOW_MINUTES))
}

pub fn valid_pin(pin: &str) -> bool {
    (4..=8).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.parse().unwrap_or_else(|err| {
            warn!("invalid {key} value {raw:?}: {err}, using default: {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_are_short_digit_strings() {
        assert!(valid_pin("1234"));
        assert!(valid_pin("12345678"));
        assert!(!valid_pin("123"));
        assert!(!valid_pin("12a4"));
        assert!(!valid_pin("123456789"));
    }

    #[test]
    fn payment_window_out_of_range_uses_default() {
        assert_eq!(payment_window(5), Duration::minutes(5));
        assert_eq!(payment_window(0), Duration::minutes(15));
        assert_eq!(payment_window(i64::MAX), Duration::minutes(15));
    }
}
