use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shown when a push arrives without its own text; the same words the server sends.
pub use common::{PING_BODY as DEFAULT_BODY, PING_TITLE as DEFAULT_TITLE};

pub const PING_QUERY: &str = "?ping=1";

/// Every ping shares one tag so a new ping replaces an undismissed one.
pub const NOTIFICATION_TAG: &str = "hourly-ping";

/// Body of an incoming push, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushMessage {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
}

impl PushMessage {
    /// Anything that is not a JSON object yields an empty message; non-string
    /// fields are ignored one by one.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data else {
            return PushMessage::default();
        };

        match serde_json::from_slice::<Value>(data) {
            Ok(Value::Object(fields)) => PushMessage {
                title: string_field(&fields, "title"),
                body: string_field(&fields, "body"),
                url: string_field(&fields, "url"),
            },
            Ok(other) => {
                log::debug!("Ignoring push body that is not an object: {other}");
                PushMessage::default()
            }
            Err(e) => {
                log::debug!("Ignoring unreadable push body: {e}");
                PushMessage::default()
            }
        }
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// What gets passed to `showNotification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub tag: &'static str,
    pub renotify: bool,
    pub data: NotificationData,
}

impl NotificationRequest {
    /// Fills empty or missing fields with the ping defaults; links default to `scope?ping=1`.
    pub fn from_message(message: PushMessage, scope: &str) -> Self {
        NotificationRequest {
            title: non_empty(message.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: non_empty(message.body).unwrap_or_else(|| DEFAULT_BODY.to_string()),
            tag: NOTIFICATION_TAG,
            renotify: true,
            data: NotificationData {
                url: non_empty(message.url).unwrap_or_else(|| default_url(scope)),
            },
        }
    }
}

pub fn default_url(scope: &str) -> String {
    format!("{scope}{PING_QUERY}")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "https://jot.example.com/";

    #[test]
    fn test_parse_fallbacks() {
        assert_eq!(PushMessage::parse(None), PushMessage::default());
        assert_eq!(PushMessage::parse(Some("".as_bytes())), PushMessage::default());
        assert_eq!(PushMessage::parse(Some("{oops".as_bytes())), PushMessage::default());
        assert_eq!(PushMessage::parse(Some("null".as_bytes())), PushMessage::default());
        assert_eq!(PushMessage::parse(Some(r#"["a"]"#.as_bytes())), PushMessage::default());

        let message = PushMessage::parse(Some(r#"{"title": 7, "body": "Still here"}"#.as_bytes()));
        assert_eq!(message.title, None);
        assert_eq!(message.body.as_deref(), Some("Still here"));
    }

    #[test]
    fn test_parse_partial_message() {
        let message = PushMessage::parse(Some(r#"{"title":"Standup","extra":true}"#.as_bytes()));
        assert_eq!(message.title.as_deref(), Some("Standup"));
        assert_eq!(message.body, None);
        assert_eq!(message.url, None);
    }

    #[test]
    fn test_defaults_fill_missing_and_empty_fields() {
        let request = NotificationRequest::from_message(
            PushMessage {
                title: Some(String::new()),
                body: None,
                url: None,
            },
            SCOPE,
        );

        assert_eq!(request.title, DEFAULT_TITLE);
        assert_eq!(request.body, DEFAULT_BODY);
        assert_eq!(request.data.url, "https://jot.example.com/?ping=1");
        assert_eq!(request.tag, "hourly-ping");
        assert!(request.renotify);
    }

    #[test]
    fn test_message_fields_win() {
        let request = NotificationRequest::from_message(
            PushMessage {
                title: Some("Lunch?".to_string()),
                body: Some("Log it".to_string()),
                url: Some("https://jot.example.com/?ping=1&src=push".to_string()),
            },
            SCOPE,
        );

        assert_eq!(request.title, "Lunch?");
        assert_eq!(request.body, "Log it");
        assert_eq!(request.data.url, "https://jot.example.com/?ping=1&src=push");
    }

    #[test]
    fn test_defaults_match_server_ping() {
        let ping = common::NotificationPayload::ping(None);
        let request = NotificationRequest::from_message(PushMessage::default(), SCOPE);

        assert_eq!(request.title, ping.title);
        assert_eq!(request.body, ping.body);
    }
}
