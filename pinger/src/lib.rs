pub mod cfg;
pub mod front_door;
mod logger;

use anyhow::anyhow;
use cfg::PingerConfig;
use common::{worker_kv::WorkerKvStore, WebPushSender};
use front_door::{accept_subscription, cors_headers, FrontDoor, Reply};
use worker::*;

type PingerDoor = FrontDoor<WorkerKvStore, WebPushSender>;

fn open_front_door(env: &Env) -> anyhow::Result<PingerDoor> {
    let config = PingerConfig::from_env(env)?;
    let store = WorkerKvStore::from_env(env)?;
    let payload = config.ping_payload();

    Ok(FrontDoor::new(
        store,
        WebPushSender::new(config.vapid),
        payload,
        config.fan_out,
    ))
}

fn into_response(reply: Reply) -> Result<Response> {
    let mut headers = Headers::new();
    if let Some(content_type) = reply.content_type {
        headers.set("content-type", content_type)?;
    }

    let response = match reply.body {
        Some(body) => Response::ok(body)?,
        None => Response::empty()?,
    };

    Ok(response.with_status(reply.status).with_headers(headers))
}

fn with_cors(mut response: Response, origin: Option<&str>) -> Result<Response> {
    for (name, value) in cors_headers(origin) {
        response.headers_mut().set(name, &value)?;
    }
    Ok(response)
}

pub async fn handle_subscribe(mut req: Request, ctx: RouteContext<()>) -> Result<Response> {
    let reply = match req.text().await {
        Ok(body) => match WorkerKvStore::from_env(&ctx.env) {
            Ok(store) => accept_subscription(&store, &body).await,
            Err(e) => Reply::failure("Subscription store unavailable", &e),
        },
        Err(e) => Reply::failure("Failed to read subscription", &anyhow!("{e}")),
    };

    into_response(reply)
}

pub async fn handle_send_now(_req: Request, ctx: RouteContext<()>) -> Result<Response> {
    let reply = match open_front_door(&ctx.env) {
        Ok(door) => door.send_now_reply().await,
        Err(e) => Reply::failure("Pinger is misconfigured", &e),
    };

    into_response(reply)
}

fn handle_preflight(_req: Request, _ctx: RouteContext<()>) -> Result<Response> {
    into_response(Reply::empty())
}

fn handle_not_found(_req: Request, _ctx: RouteContext<()>) -> Result<Response> {
    into_response(Reply::not_found())
}

#[event(fetch)]
async fn fetch(req: Request, env: Env, _ctx: worker::Context) -> Result<Response> {
    console_error_panic_hook::set_once();
    logger::init();

    let origin = req.headers().get("origin").ok().flatten();
    let router = Router::new();

    let routed = router
        .post_async("/subscribe", handle_subscribe)
        .get_async("/send-now", handle_send_now)
        .post_async("/send-now", handle_send_now)
        .options("/", handle_preflight)
        .options("/*path", handle_preflight)
        .or_else_any_method("/", handle_not_found)
        .or_else_any_method("/*path", handle_not_found)
        .run(req, env)
        .await;

    let response = match routed {
        // Known path, other method: the router says 405, callers expect 404
        Ok(response) if response.status_code() == 405 => into_response(Reply::not_found())?,
        Ok(response) => response,
        Err(e) => into_response(Reply::failure("Request failed", &anyhow!("{e}")))?,
    };

    with_cors(response, origin.as_deref())
}

#[event(scheduled)]
async fn scheduled(_event: ScheduledEvent, env: Env, ctx: ScheduleContext) {
    console_error_panic_hook::set_once();
    logger::init();

    match open_front_door(&env) {
        Ok(door) => ctx.wait_until(door.into_scheduled_run()),
        Err(e) => log::error!("Scheduled ping skipped: {e:#}"),
    }
}
