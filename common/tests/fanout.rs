use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::{
    fan_out, FanOutOptions, MemoryStore, NotificationPayload, SubscriptionKeys,
    SubscriptionRecord, SubscriptionStore, VapidCredentials, WebPushSender,
};
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn vapid() -> VapidCredentials {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key().to_encoded_point(false);
    VapidCredentials::new(
        &URL_SAFE_NO_PAD.encode(public.as_bytes()),
        &URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        Some("mailto:pings@example.com"),
    )
    .unwrap()
}

// A subscription the way a browser would hand it over
fn browser_subscription(endpoint: String) -> String {
    let browser_key = SecretKey::random(&mut OsRng);
    let record = SubscriptionRecord {
        endpoint,
        keys: SubscriptionKeys {
            p256dh: URL_SAFE_NO_PAD.encode(browser_key.public_key().to_encoded_point(false).as_bytes()),
            auth: URL_SAFE_NO_PAD.encode([42u8; 16]),
        },
    };
    serde_json::to_string(&record).unwrap()
}

async fn push_service(routes: &[(&str, u16)]) -> MockServer {
    let server = MockServer::start().await;
    for (route, status) in routes {
        Mock::given(method("POST"))
            .and(path(*route))
            .respond_with(ResponseTemplate::new(*status))
            .expect(1)
            .mount(&server)
            .await;
    }
    server
}

#[tokio::test]
async fn healthy_kept_and_stale_pruned() {
    init_logger();
    let server = push_service(&[("/healthy", 201), ("/stale", 404)]).await;

    let store = MemoryStore::new();
    let id_healthy = "4d0c3a52-healthy";
    let id_stale = "9f1e7b60-stale";
    store
        .put(id_healthy, &browser_subscription(format!("{}/healthy", server.uri())))
        .await
        .unwrap();
    store
        .put(id_stale, &browser_subscription(format!("{}/stale", server.uri())))
        .await
        .unwrap();

    let sender = WebPushSender::new(vapid());
    let payload = NotificationPayload::ping(Some("https://jot.example.com/"));
    let results = fan_out(&store, &sender, &payload, FanOutOptions::default())
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&results).unwrap(),
        serde_json::json!([[id_healthy, "ok"], [id_stale, "err:404"]])
    );
    assert_eq!(store.keys(), vec![id_healthy]);
}

#[tokio::test]
async fn all_accepted_across_pages() {
    init_logger();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(5)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    for i in 0..5 {
        store
            .put(
                &format!("sub-{i}"),
                &browser_subscription(format!("{}/endpoint/{i}", server.uri())),
            )
            .await
            .unwrap();
    }

    let sender = WebPushSender::new(vapid());
    let options = FanOutOptions {
        page_size: 2,
        concurrency: 3,
    };
    let results = fan_out(&store, &sender, &NotificationPayload::ping(None), options)
        .await
        .unwrap();

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.1.to_string() == "ok"));
    assert_eq!(store.len(), 5);
}

#[tokio::test]
async fn gone_endpoint_pruned_after_one_pass() {
    init_logger();
    let server = push_service(&[("/gone", 410)]).await;

    let store = MemoryStore::new();
    store
        .put("sub", &browser_subscription(format!("{}/gone", server.uri())))
        .await
        .unwrap();

    let sender = WebPushSender::new(vapid());
    let results = fan_out(
        &store,
        &sender,
        &NotificationPayload::ping(None),
        FanOutOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(results[0].1.to_string(), "err:410");
    assert!(store.is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_is_kept() {
    init_logger();
    let store = MemoryStore::new();
    // Connection refused, with 410 buried in the push token
    store
        .put(
            "healthy",
            &browser_subscription("http://127.0.0.1:9/fcm/send/dXk410aZ".to_string()),
        )
        .await
        .unwrap();

    let sender = WebPushSender::new(vapid());
    let results = fan_out(
        &store,
        &sender,
        &NotificationPayload::ping(None),
        FanOutOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(results[0].1.to_string(), "err");
    assert!(store.contains("healthy"));
}
