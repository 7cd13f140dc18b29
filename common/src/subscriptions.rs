use serde::{Deserialize, Serialize};

pub const PING_TITLE: &str = "What are you doing?";
pub const PING_BODY: &str = "Tap to jot a one-liner.";
pub const PING_PATH: &str = "/?ping=1";

/// Browser push subscription as produced by `PushSubscription.toJSON()`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl NotificationPayload {
    /// The hourly ping, linking back to `app_url` when one is configured.
    pub fn ping(app_url: Option<&str>) -> Self {
        let base = app_url
            .map(|url| url.strip_suffix('/').unwrap_or(url))
            .unwrap_or_default();

        let url = if base.is_empty() {
            PING_PATH.to_string()
        } else {
            format!("{base}{PING_PATH}")
        };

        NotificationPayload {
            title: PING_TITLE.to_string(),
            body: PING_BODY.to_string(),
            url,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ping_url_from_app_url() {
        let payload = NotificationPayload::ping(Some("https://jot.example.com/"));
        assert_eq!(payload.url, "https://jot.example.com/?ping=1");
        assert_eq!(payload.title, PING_TITLE);
        assert_eq!(payload.body, PING_BODY);

        // Only one trailing slash is stripped
        let payload = NotificationPayload::ping(Some("https://jot.example.com/app//"));
        assert_eq!(payload.url, "https://jot.example.com/app//?ping=1");
    }

    #[test]
    fn test_ping_url_without_app_url() {
        assert_eq!(NotificationPayload::ping(None).url, "/?ping=1");
        assert_eq!(NotificationPayload::ping(Some("")).url, "/?ping=1");
        assert_eq!(NotificationPayload::ping(Some("/")).url, "/?ping=1");
    }

    #[test]
    fn test_subscription_record_accepts_browser_json() {
        let raw = r#"{
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
            "expirationTime": null,
            "keys": { "p256dh": "BPub", "auth": "secret" }
        }"#;
        let record: SubscriptionRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.endpoint, "https://fcm.googleapis.com/fcm/send/abc");
        assert_eq!(record.keys.p256dh, "BPub");
        assert_eq!(record.keys.auth, "secret");

        assert!(serde_json::from_str::<SubscriptionRecord>(r#"{"endpoint":"x"}"#).is_err());
    }
}
