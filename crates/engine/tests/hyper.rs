mod common;

use common::{free_port, get, options, request, send_raw, spawn};
use gantry_core::{App, AppError, AppOptions, Context, EngineError, Response, Route, Router, StaticBundle, describe, handler_fn};
use gantry_engine::HyperEngine;
use http::StatusCode;
use indoc::indoc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

describe! {
    #[derive(Serialize, Deserialize)]
    struct Item {
        id: String,
        name: String,
    }
}

async fn get_item(ctx: Arc<Context>) -> Response {
    match ctx.param("id") {
        Some("0") => Response::error(StatusCode::NOT_FOUND, "no such item"),
        Some(id) => ctx.json(&Item { id: id.to_string(), name: ctx.query_param("name").unwrap_or("unnamed").to_string() }),
        None => Response::error(StatusCode::BAD_REQUEST, "missing id"),
    }
}

async fn create_item(ctx: Arc<Context>) -> Response {
    match ctx.body_json::<Item>() {
        Ok(item) => ctx.json(&item).with_status(StatusCode::CREATED),
        Err(e) => Response::error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn echo_header(ctx: Arc<Context>) -> Response {
    ctx.json(&ctx.header("x-test"))
}

async fn explode(_ctx: Arc<Context>) -> Response {
    panic!("handler failure")
}

fn items() -> Router {
    Router::new().prefix("/api").group("Items").routes([
        Route::get::<Item>("/items/:id", handler_fn(get_item)).query("name"),
        Route::post::<Item, Item>("/items", handler_fn(create_item)),
        Route::get::<Option<String>>("/header", handler_fn(echo_header)),
    ])
}

#[tokio::test]
async fn serves_routes_and_preserves_status() {
    let port = free_port();
    let mut app = App::create(HyperEngine::new(), [options("hyper-basic", port)]).unwrap();
    app.register_router(items()).unwrap();
    let server = spawn(app).await;

    let reply = get(port, "/api/items/42?name=bolt").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));
    assert_eq!(reply.json(), serde_json::json!({ "id": "42", "name": "bolt" }));

    assert_eq!(get(port, "/api/items/0").await.status, 404);

    let created = request(port, "POST", "/api/items", &[], r#"{"id":"7","name":"nut"}"#).await;
    assert_eq!(created.status, 201);
    assert_eq!(created.json()["name"], "nut");

    assert_eq!(request(port, "POST", "/api/items", &[], "not json").await.status, 400);

    let header = request(port, "GET", "/api/header", &[("x-test", "1")], "").await;
    assert_eq!(header.json(), "1");

    let missing = get(port, "/nowhere").await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.json()["error"], "not found");

    let wrong_method = request(port, "DELETE", "/api/items/1", &[], "").await;
    assert_eq!(wrong_method.status, 405);
    assert_eq!(wrong_method.header("allow"), Some("GET"));

    server.abort();
}

#[tokio::test]
async fn serves_the_openapi_document() {
    let port = free_port();
    let mut app = App::create(HyperEngine::new(), [options("hyper-docs", port).server_addresses(["127.0.0.1"])]).unwrap();
    app.register_router(items()).unwrap();
    let server = spawn(app).await;

    let docs = get(port, "/docs").await.json();
    assert_eq!(docs["info"]["title"], "hyper-docs");
    assert_eq!(docs["servers"][0]["url"], format!("http://127.0.0.1:{port}"));

    let get_op = &docs["paths"]["/api/items/{id}"]["get"];
    assert_eq!(get_op["tags"][0], "Items");
    assert_eq!(get_op["parameters"][1]["name"], "name");
    assert_eq!(docs["components"]["schemas"]["Item"]["properties"]["id"]["type"], "string");

    server.abort();
}

#[tokio::test]
async fn default_middleware_adds_headers_and_recovers() {
    let port = free_port();
    let mut app =
        App::create(HyperEngine::new(), [options("hyper-middleware", port).default_middleware(true).request_logging(true)])
            .unwrap();
    app.register_routes([Route::get::<()>("/explode", handler_fn(explode))]).unwrap();
    app.register_router(items()).unwrap();
    let server = spawn(app).await;

    let reply = get(port, "/api/items/1").await;
    assert_eq!(reply.header("access-control-allow-origin"), Some("*"));
    assert_eq!(reply.header("x-request-id").map(str::len), Some(36));

    let traced = request(port, "GET", "/api/items/1", &[("x-request-id", "req-123")], "").await;
    assert_eq!(traced.header("x-request-id"), Some("req-123"));

    let preflight = send_raw(
        port,
        indoc! {"
            OPTIONS /api/items HTTP/1.1\r
            Host: localhost\r
            Origin: http://example.com\r
            Access-Control-Request-Method: POST\r
            Connection: close\r
            \r
        "},
    )
    .await;
    assert_eq!(preflight.status, 204);
    assert!(preflight.header("access-control-allow-methods").is_some_and(|m| m.contains("POST")));

    assert_eq!(get(port, "/explode").await.status, 500);
    assert_eq!(get(port, "/api/items/2").await.status, 200);

    server.abort();
}

#[tokio::test]
async fn metrics_tracing_and_frontend() {
    let port = free_port();
    let bundle = StaticBundle::new().insert("/index.html", "<h1>hi</h1>").insert("/app.css", "body{}");
    let options = options("hyper-telemetry", port)
        .metrics(true)
        .tracing_collector("http://collector:14268/api/traces")
        .static_frontend(bundle);
    let mut app = App::create(HyperEngine::new(), [options]).unwrap();
    app.register_router(items()).unwrap();
    let server = spawn(app).await;

    let traced = request(
        port,
        "GET",
        "/api/items/9",
        &[("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")],
        "",
    )
    .await;
    assert_eq!(traced.status, 200);

    let metrics = get(port, "/metrics").await;
    assert_eq!(metrics.status, 200);
    assert!(metrics.body.contains("http_requests_total"));
    assert!(metrics.body.contains(r#"app="hyper-telemetry""#));

    let index = get(port, "/").await;
    assert_eq!(index.body, "<h1>hi</h1>");
    assert!(index.header("content-type").is_some_and(|t| t.starts_with("text/html")));
    assert!(get(port, "/app.css").await.header("content-type").is_some_and(|t| t.starts_with("text/css")));

    server.abort();
}

#[tokio::test]
async fn bind_failure_names_host_and_port() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let app = App::create(HyperEngine::new(), [AppOptions::new().host("127.0.0.1").port(port).banner(false)]).unwrap();
    let err = app.run().await.unwrap_err();

    let AppError::Engine(EngineError::Bind { addr, .. }) = &err else { panic!("expected a bind error, got {err}") };
    assert_eq!(*addr, format!("127.0.0.1:{port}"));
}

#[tokio::test]
async fn client_disconnect_cancels_request_scope() {
    let (started_tx, started_rx) = oneshot::channel();
    let (cancelled_tx, cancelled_rx) = oneshot::channel();
    let signals = Arc::new(Mutex::new(Some((started_tx, cancelled_tx))));

    let wait = handler_fn(move |ctx: Arc<Context>| {
        let signals = Arc::clone(&signals);
        async move {
            let taken = signals.lock().unwrap().take();
            if let Some((started, cancelled)) = taken {
                let scope = ctx.scope().clone();
                tokio::spawn(async move {
                    scope.cancelled().await;
                    let _ = cancelled.send(());
                });
                let _ = started.send(());
            }
            std::future::pending::<Response>().await
        }
    });

    let port = free_port();
    let mut app = App::create(HyperEngine::new(), [options("hyper-cancel", port)]).unwrap();
    app.register_routes([Route::get::<()>("/wait", wait)]).unwrap();
    let server = spawn(app).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(b"GET /wait HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), started_rx).await.unwrap().unwrap();

    drop(stream);
    tokio::time::timeout(Duration::from_secs(5), cancelled_rx).await.unwrap().unwrap();

    server.abort();
}
