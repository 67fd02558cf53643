use gantry_core::logging::{self, LogMode};
use gantry_core::{App, AppOptions, Context, Response, Route, Router, describe, handler_fn};
use gantry_engine::{AxumEngine, HyperEngine};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

describe! {
    #[derive(Serialize, Deserialize)]
    struct Greeting {
        name: String,
        message: String,
    }
}

async fn greet(ctx: Arc<Context>) -> Response {
    match ctx.param("name") {
        Some(name) => ctx.json(&Greeting { name: name.to_string(), message: format!("hello {name}") }),
        None => Response::error(StatusCode::BAD_REQUEST, "missing name"),
    }
}

async fn echo(ctx: Arc<Context>) -> Response {
    match ctx.body_json::<Greeting>() {
        Ok(greeting) => ctx.json(&greeting).with_status(StatusCode::CREATED),
        Err(e) => Response::error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn greetings() -> Router {
    Router::new().prefix("/api").group("Greetings").routes([
        Route::get::<Greeting>("/greet/:name", handler_fn(greet)),
        Route::post::<Greeting, Greeting>("/echo", handler_fn(echo)),
    ])
}

#[tokio::main]
async fn main() {
    logging::init(LogMode::Development).unwrap();

    // GANTRY_* variables override the defaults below.
    let env = AppOptions::from_env().unwrap();
    let shared = AppOptions::new().version("0.1.0").default_middleware(true).request_logging(true);

    let mut hyper_app = App::create(
        HyperEngine::new(),
        [shared.clone().id("hyper-demo").port(3000).metrics(true), env.clone()],
    )
    .unwrap();
    hyper_app.register_router(greetings()).unwrap();

    let mut axum_app = App::create(AxumEngine::new(), [shared.id("axum-demo").port(3001), env]).unwrap();
    axum_app.register_router(greetings()).unwrap();

    let (hyper_result, axum_result) = tokio::join!(hyper_app.run(), axum_app.run());
    hyper_result.unwrap();
    axum_result.unwrap();
}
