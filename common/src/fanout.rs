use crate::push::{is_gone_error, Delivery, Pusher};
use crate::store::{SubscriptionStore, DEFAULT_PAGE_SIZE};
use crate::subscriptions::{NotificationPayload, SubscriptionRecord};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;

/// `[id, outcome]`, serialized as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult(pub String, pub Delivery);

#[derive(Debug, Clone, Copy)]
pub struct FanOutOptions {
    pub page_size: u64,
    /// Deliveries in flight at once within a page.
    pub concurrency: usize,
}

impl Default for FanOutOptions {
    fn default() -> Self {
        FanOutOptions {
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: 1,
        }
    }
}

/// Sends `payload` to every stored subscription and prunes the ones that are gone.
///
/// Results follow scan order. Only a failure to list the store aborts the run;
/// anything that goes wrong for a single subscriber is reported as its outcome.
pub async fn fan_out<S, P>(
    store: &S,
    pusher: &P,
    payload: &NotificationPayload,
    options: FanOutOptions,
) -> Result<Vec<DeliveryResult>>
where
    S: SubscriptionStore + ?Sized,
    P: Pusher + ?Sized,
{
    let body = serde_json::to_vec(payload).context("Failed to serialize notification payload")?;
    let concurrency = options.concurrency.max(1);

    let mut results = Vec::new();
    let mut cursor = None;
    let mut pages = 0;

    loop {
        let page = store
            .list(cursor.take(), options.page_size)
            .await
            .context("Failed to list subscriptions")?;
        pages += 1;

        let delivered: Vec<Option<DeliveryResult>> = stream::iter(page.keys)
            .map(|id| deliver(store, pusher, &body, id))
            .buffered(concurrency)
            .collect()
            .await;
        results.extend(delivered.into_iter().flatten());

        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let accepted = results
        .iter()
        .filter(|result| result.1 == Delivery::Accepted)
        .count();
    log::info!(
        "Fan-out finished: {accepted}/{} delivered across {pages} page(s)",
        results.len()
    );

    Ok(results)
}

// `None` when the entry disappeared between listing and lookup
async fn deliver<S, P>(store: &S, pusher: &P, body: &[u8], id: String) -> Option<DeliveryResult>
where
    S: SubscriptionStore + ?Sized,
    P: Pusher + ?Sized,
{
    let raw = match store.get(&id).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            log::debug!("Subscription {id} vanished before delivery, skipping");
            return None;
        }
        Err(e) => {
            log::warn!("Failed to read subscription {id}: {e:#}");
            return Some(DeliveryResult(id, Delivery::Failed));
        }
    };

    let subscription: SubscriptionRecord = match serde_json::from_str(&raw) {
        Ok(subscription) => subscription,
        Err(e) => {
            log::warn!("Subscription {id} is not a valid push subscription: {e}");
            return Some(DeliveryResult(id, Delivery::Failed));
        }
    };

    let (delivery, gone) = match pusher.push(&subscription, body).await {
        Ok(status) => {
            let delivery = Delivery::from_status(status);
            (delivery, delivery.is_gone())
        }
        Err(e) => {
            log::warn!("Push to {id} failed: {e:#}");
            (Delivery::Failed, is_gone_error(&e))
        }
    };

    if gone {
        log::info!("Pruning subscription {id} ({delivery})");
        if let Err(e) = store.delete(&id).await {
            log::warn!("Failed to prune subscription {id}: {e:#}");
        }
    }

    Some(DeliveryResult(id, delivery))
}
