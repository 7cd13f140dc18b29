use anyhow::Result;
use common::{
    fan_out, DeliveryResult, FanOutOptions, NotificationPayload, Pusher, SubscriptionRecord,
    SubscriptionStore,
};
use futures::future::{FutureExt, LocalBoxFuture};
use uuid::Uuid;

pub const OK: &str = "ok";
pub const NOT_FOUND: &str = "not found";
pub const BAD_REQUEST: &str = "bad request";

const TEXT_PLAIN: &str = "text/plain;charset=UTF-8";
const APPLICATION_JSON: &str = "application/json";

/// Work the host must await before it considers a trigger finished.
pub type PendingWork = LocalBoxFuture<'static, ()>;

/// Cross-origin headers carried by every response, echoing the caller's origin.
pub fn cors_headers(origin: Option<&str>) -> [(&'static str, String); 3] {
    let origin = origin.filter(|o| !o.is_empty()).unwrap_or("*");
    [
        ("access-control-allow-origin", origin.to_string()),
        ("access-control-allow-methods", "GET,POST,OPTIONS".to_string()),
        ("access-control-allow-headers", "content-type".to_string()),
    ]
}

/// Runtime-independent response, turned into a `worker::Response` at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: Option<String>,
    pub content_type: Option<&'static str>,
}

impl Reply {
    pub fn empty() -> Self {
        Reply {
            status: 200,
            body: None,
            content_type: None,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Reply {
            status,
            body: Some(body.into()),
            content_type: Some(TEXT_PLAIN),
        }
    }

    pub fn json(body: String) -> Self {
        Reply {
            status: 200,
            body: Some(body),
            content_type: Some(APPLICATION_JSON),
        }
    }

    pub fn not_found() -> Self {
        Reply::text(404, NOT_FOUND)
    }

    /// 500 carrying the error chain.
    pub fn failure(context: &str, err: &anyhow::Error) -> Self {
        log::error!("{context}: {err:#}");
        Reply::text(500, format!("{err:#}"))
    }
}

/// Validates `body` as a browser subscription and stores it verbatim.
///
/// Needs nothing but the store, so subscribing keeps working while the push
/// credentials are missing.
pub async fn accept_subscription<S>(store: &S, body: &str) -> Reply
where
    S: SubscriptionStore + ?Sized,
{
    let record = body.trim();
    if let Err(e) = serde_json::from_str::<SubscriptionRecord>(record) {
        log::warn!("Rejected subscription: {e}");
        return Reply::text(400, BAD_REQUEST);
    }

    match store_subscription(store, record).await {
        Ok(id) => {
            log::info!("Stored subscription {id}");
            Reply::text(200, OK)
        }
        Err(e) => Reply::failure("Failed to store subscription", &e),
    }
}

/// Stores `record` under a fresh identifier and returns it.
pub async fn store_subscription<S>(store: &S, record: &str) -> Result<String>
where
    S: SubscriptionStore + ?Sized,
{
    let id = Uuid::new_v4().to_string();
    store.put(&id, record).await?;
    Ok(id)
}

/// Everything a fan-out needs: where subscriptions live, how to reach them
/// and what to say.
pub struct FrontDoor<S, P> {
    store: S,
    pusher: P,
    payload: NotificationPayload,
    options: FanOutOptions,
}

impl<S, P> FrontDoor<S, P>
where
    S: SubscriptionStore,
    P: Pusher,
{
    pub fn new(store: S, pusher: P, payload: NotificationPayload, options: FanOutOptions) -> Self {
        FrontDoor {
            store,
            pusher,
            payload,
            options,
        }
    }

    pub async fn send_now(&self) -> Result<Vec<DeliveryResult>> {
        fan_out(&self.store, &self.pusher, &self.payload, self.options).await
    }

    /// `send_now` rendered as the JSON list of `[id, outcome]` pairs.
    pub async fn send_now_reply(&self) -> Reply {
        match self.send_now().await {
            Ok(results) => match serde_json::to_string(&results) {
                Ok(json) => Reply::json(json),
                Err(e) => Reply::failure("Failed to serialize results", &anyhow::Error::new(e)),
            },
            Err(e) => Reply::failure("Send-now failed", &e),
        }
    }
}

impl<S, P> FrontDoor<S, P>
where
    S: SubscriptionStore + 'static,
    P: Pusher + 'static,
{
    /// The timer-driven run, handed to the host instead of being spawned.
    pub fn into_scheduled_run(self) -> PendingWork {
        async move {
            match self.send_now().await {
                Ok(results) => log::info!("Scheduled ping reached {} subscriber(s)", results.len()),
                Err(e) => log::error!("Scheduled ping failed: {e:#}"),
            }
        }
        .boxed_local()
    }
}
