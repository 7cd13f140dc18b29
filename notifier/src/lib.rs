//! Client side of the hourly ping: the service-worker logic that shows
//! incoming pushes and routes notification clicks back into the app.
//!
//! The browser is reached only through [`ServiceWorkerRuntime`], so the same
//! handlers run against a real `ServiceWorkerGlobalScope` binding or a fake.

pub mod message;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use message::*;

/// Message posted to a window that was brought to the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Focus,
}

/// An open application window.
#[async_trait(?Send)]
pub trait WindowClient {
    fn url(&self) -> &str;

    async fn focus(&self) -> Result<()>;

    fn post_message(&self, message: &ClientMessage) -> Result<()>;
}

/// A notification the user clicked.
pub trait ShownNotification {
    /// The `data` attached when the notification was shown, if it survived.
    fn data(&self) -> Option<&NotificationData>;

    fn close(&self);
}

/// Capabilities the handlers need from the service-worker global scope.
#[async_trait(?Send)]
pub trait ServiceWorkerRuntime {
    type Window: WindowClient;

    /// Registration scope, e.g. `https://jot.example.com/`.
    fn scope(&self) -> &str;

    async fn skip_waiting(&self) -> Result<()>;

    async fn claim_clients(&self) -> Result<()>;

    async fn show_notification(&self, request: &NotificationRequest) -> Result<()>;

    /// All window clients, including ones this worker does not control yet.
    async fn match_windows(&self) -> Result<Vec<Self::Window>>;

    async fn open_window(&self, url: &str) -> Result<()>;
}

/// The service-worker events this crate reacts to.
#[async_trait(?Send)]
pub trait NotificationHandlers {
    async fn on_install(&self) -> Result<()>;

    async fn on_activate(&self) -> Result<()>;

    async fn on_push(&self, data: Option<&[u8]>) -> Result<()>;

    async fn on_notification_click(&self, notification: &dyn ShownNotification) -> Result<()>;
}

pub struct PingNotifier<R> {
    runtime: R,
}

impl<R: ServiceWorkerRuntime> PingNotifier<R> {
    pub fn new(runtime: R) -> Self {
        PingNotifier { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }
}

#[async_trait(?Send)]
impl<R: ServiceWorkerRuntime> NotificationHandlers for PingNotifier<R> {
    async fn on_install(&self) -> Result<()> {
        self.runtime.skip_waiting().await
    }

    async fn on_activate(&self) -> Result<()> {
        self.runtime.claim_clients().await
    }

    async fn on_push(&self, data: Option<&[u8]>) -> Result<()> {
        let message = PushMessage::parse(data);
        let request = NotificationRequest::from_message(message, self.runtime.scope());
        self.runtime.show_notification(&request).await
    }

    async fn on_notification_click(&self, notification: &dyn ShownNotification) -> Result<()> {
        notification.close();

        let scope = self.runtime.scope();
        let url = notification
            .data()
            .map(|data| data.url.clone())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| default_url(scope));

        let windows = self.runtime.match_windows().await?;
        match windows.iter().find(|window| window.url().starts_with(scope)) {
            Some(window) => {
                if let Err(e) = window.focus().await {
                    log::warn!("Could not focus {}: {e:#}", window.url());
                }
                window.post_message(&ClientMessage::Focus)
            }
            None => self.runtime.open_window(&url).await,
        }
    }
}
