//! Web Push delivery.
//!
//! Messages are encrypted and signed in pure Rust and sent with `reqwest`, so
//! the same code runs natively and inside a Worker.

use crate::encryption::{self, CONTENT_ENCODING};
use crate::subscriptions::SubscriptionRecord;
use crate::vapid::VapidCredentials;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, Serializer};
use std::fmt;

/// 15 minutes; an hourly ping is worthless once the next one is due.
pub const PING_TTL_SECONDS: u32 = 900;

/// Substrings in a failed send's error text that mark the endpoint as gone.
const GONE_MARKERS: [&str; 3] = ["404", "410", "gone"];

/// Sends one already-serialized payload to one subscriber.
///
/// Returns the push service's HTTP status. `Err` means no status was obtained:
/// the request could not be built, signed or transmitted.
#[async_trait(?Send)]
pub trait Pusher {
    async fn push(&self, subscription: &SubscriptionRecord, payload: &[u8]) -> Result<u16>;
}

#[async_trait(?Send)]
impl<P: Pusher + ?Sized> Pusher for &P {
    async fn push(&self, subscription: &SubscriptionRecord, payload: &[u8]) -> Result<u16> {
        (**self).push(subscription, payload).await
    }
}

pub struct WebPushSender {
    client: reqwest::Client,
    credentials: VapidCredentials,
    ttl: u32,
}

impl WebPushSender {
    pub fn new(credentials: VapidCredentials) -> Self {
        WebPushSender {
            client: reqwest::Client::new(),
            credentials,
            ttl: PING_TTL_SECONDS,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait(?Send)]
impl Pusher for WebPushSender {
    async fn push(&self, subscription: &SubscriptionRecord, payload: &[u8]) -> Result<u16> {
        let body = encryption::encrypt(&subscription.keys, payload)
            .context("Failed to encrypt web push message")?;
        let authorization = self
            .credentials
            .authorization(&subscription.endpoint, Utc::now().timestamp())
            .context("Failed to sign VAPID token")?;

        // Endpoints carry random tokens; keep them out of the error text
        let response = self
            .client
            .post(subscription.endpoint.as_str())
            .header("TTL", self.ttl.to_string())
            .header("Content-Encoding", CONTENT_ENCODING)
            .header("Content-Type", "application/octet-stream")
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Web push request failed")?;

        Ok(response.status().as_u16())
    }
}

/// Outcome of one delivery attempt, rendered as `ok`, `err:<status>` or `err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    Rejected(u16),
    Failed,
}

impl Delivery {
    /// Only 201 Created counts as accepted.
    pub fn from_status(status: u16) -> Self {
        match status {
            201 => Delivery::Accepted,
            status => Delivery::Rejected(status),
        }
    }

    /// The push service says this subscription will never work again.
    pub fn is_gone(&self) -> bool {
        matches!(self, Delivery::Rejected(404 | 410))
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Accepted => write!(f, "ok"),
            Delivery::Rejected(status) => write!(f, "err:{status}"),
            Delivery::Failed => write!(f, "err"),
        }
    }
}

impl Serialize for Delivery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Heuristic for errors that never produced a status: treat the endpoint as gone
/// when the error chain mentions 404, 410 or "gone".
pub fn is_gone_error(err: &anyhow::Error) -> bool {
    let text = format!("{err:#}");
    GONE_MARKERS.iter().any(|marker| text.contains(marker))
}
