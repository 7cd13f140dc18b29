use anyhow::{anyhow, Context, Result};
use common::{FanOutOptions, NotificationPayload, VapidCredentials};
use worker::Env;

pub const VAPID_PUBLIC: &str = "VAPID_PUBLIC";
pub const VAPID_PRIVATE: &str = "VAPID_PRIVATE";
pub const VAPID_SUBJECT: &str = "VAPID_SUBJECT";
pub const APP_URL: &str = "APP_URL";
pub const PING_CONCURRENCY: &str = "PING_CONCURRENCY";

#[derive(Debug, Clone)]
pub struct PingerConfig {
    pub vapid: VapidCredentials,
    pub app_url: Option<String>,
    pub fan_out: FanOutOptions,
}

impl PingerConfig {
    /// Reads secrets and vars from the worker environment.
    pub fn from_env(env: &Env) -> Result<Self> {
        Self::from_lookup(|name| {
            env.secret(name)
                .map(|secret| secret.to_string())
                .or_else(|_| env.var(name).map(|var| var.to_string()))
                .ok()
        })
    }

    /// Builds the config from any name → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| lookup(name).ok_or_else(|| anyhow!("Expect {name}"));

        let subject = lookup(VAPID_SUBJECT);
        let vapid = VapidCredentials::new(
            &required(VAPID_PUBLIC)?,
            &required(VAPID_PRIVATE)?,
            subject.as_deref(),
        )
        .context("Invalid VAPID credentials")?;

        let mut fan_out = FanOutOptions::default();
        if let Some(concurrency) = lookup(PING_CONCURRENCY).filter(|v| !v.trim().is_empty()) {
            fan_out.concurrency = concurrency
                .trim()
                .parse()
                .with_context(|| format!("{PING_CONCURRENCY} must be a positive integer"))?;
        }

        Ok(PingerConfig {
            vapid,
            app_url: lookup(APP_URL).filter(|url| !url.is_empty()),
            fan_out,
        })
    }

    pub fn ping_payload(&self) -> NotificationPayload {
        NotificationPayload::ping(self.app_url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Valid P-256 pair used only by tests
    const TEST_PUBLIC: &str =
        "BMbOV3tGK7sFiQTXgXQcuOoX5QLq2Gu9rzFU-JnkRm3In46OJH41v8qyksZo0-ayhqmEFqp0zNOPZ9WlLIBQKXk";
    const TEST_PRIVATE: &str = "POXpzN__6JWh9d-XkNVsfxnS5KYuCJP2OqbDNrUF9qQ";

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn test_minimal_config() {
        let config = PingerConfig::from_lookup(lookup_from(&[
            (VAPID_PUBLIC, TEST_PUBLIC),
            (VAPID_PRIVATE, TEST_PRIVATE),
        ]))
        .unwrap();

        assert_eq!(config.vapid.subject(), "mailto:you@example.com");
        assert_eq!(config.app_url, None);
        assert_eq!(config.fan_out.concurrency, 1);
        assert_eq!(config.ping_payload().url, "/?ping=1");
    }

    #[test]
    fn test_full_config() {
        let config = PingerConfig::from_lookup(lookup_from(&[
            (VAPID_PUBLIC, TEST_PUBLIC),
            (VAPID_PRIVATE, TEST_PRIVATE),
            (VAPID_SUBJECT, "mailto:ops@example.com"),
            (APP_URL, "https://jot.example.com/"),
            (PING_CONCURRENCY, "8"),
        ]))
        .unwrap();

        assert_eq!(config.vapid.subject(), "mailto:ops@example.com");
        assert_eq!(config.fan_out.concurrency, 8);
        assert_eq!(config.ping_payload().url, "https://jot.example.com/?ping=1");
    }

    #[test]
    fn test_missing_or_bad_values_rejected() {
        let missing = PingerConfig::from_lookup(lookup_from(&[(VAPID_PUBLIC, TEST_PUBLIC)]));
        assert!(missing.unwrap_err().to_string().contains(VAPID_PRIVATE));

        let bad_concurrency = PingerConfig::from_lookup(lookup_from(&[
            (VAPID_PUBLIC, TEST_PUBLIC),
            (VAPID_PRIVATE, TEST_PRIVATE),
            (PING_CONCURRENCY, "lots"),
        ]));
        assert!(bad_concurrency.is_err());
    }
}
