//! The HTTP surface, driven in-process through `tower::ServiceExt::oneshot`.

mod support;

use std::collections::HashSet;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use rdfshape_mcp::{ServerConfig, http_router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use support::*;

fn router_with(config: ServerConfig, fetcher: MapFetcher, token: CancellationToken) -> Router {
    let state = app_state(config.clone(), fetcher);
    http_router(Arc::new(config), state, token)
}

fn router() -> Router {
    router_with(ServerConfig::default(), MapFetcher::new(), CancellationToken::new())
}

async fn send(router: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = router.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

#[tokio::test]
async fn validate_reports_conformance() {
    let (status, body) = send(
        router(),
        Method::POST,
        "/api/validate",
        Some(json!({
            "data": "<a> <b> <c> .",
            "schema": "<S> { <b> . }",
            "shapeMap": "<a>@<S>",
            "html": true
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true), "{body}");
    assert_eq!(body["isError"], json!(false));
    assert_eq!(body["data"], json!("<a> <b> <c> ."));
    assert!(body["elapsedNanos"].as_u64().unwrap() > 0);
    assert!(body["html"].as_str().unwrap().contains("conformant"));
}

#[tokio::test]
async fn validate_returns_error_results_for_unreachable_data() {
    let (status, body) = send(
        router(),
        Method::POST,
        "/api/validate",
        Some(json!({
            "dataUrl": "http://unreachable.invalid/data.ttl",
            "schema": "<S> { <b> . }",
            "shapeMap": "<a>@<S>",
            "activeShapeMapTab": "byText"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isError"], json!(true));
    assert_eq!(body["elapsedNanos"], json!(0));
    assert!(body.get("trigger").is_none());
    assert_eq!(body["activeShapeMapTab"], json!("byText"));
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn validate_fetches_remote_data_through_the_fetcher() {
    let fetcher = MapFetcher::new().with("http://example.org/people.ttl", PERSON_TURTLE);
    let router = router_with(ServerConfig::default(), fetcher, CancellationToken::new());
    let (status, body) = send(
        router,
        Method::POST,
        "/api/validate",
        Some(json!({
            "dataUrl": "http://example.org/people.ttl",
            "schema": PERSON_SHEX,
            "shapeMap": "ex:alice@ex:Person,ex:bob@ex:Person"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true), "{body}");
    assert_eq!(body["result"]["shapeMap"].as_array().unwrap().len(), 2);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn unknown_inference_engine_maps_to_its_error_code() {
    let (status, body) = send(
        router(),
        Method::POST,
        "/api/data/info",
        Some(json!({ "data": PERSON_TURTLE, "inference": "bogus" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!(-32003));
    assert!(body["message"].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn schema_routes_answer() {
    let (status, body) = send(
        router(),
        Method::POST,
        "/api/schema/convert",
        Some(json!({
            "schema": PERSON_SHACL,
            "schemaEngine": "SHACL",
            "schemaFormat": "Turtle",
            "targetSchemaEngine": "ShEx"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["targetFormat"], json!("ShExC"));
    assert!(!body["shapeMapCompact"].as_str().unwrap().is_empty());

    let (status, body) = send(
        router(),
        Method::POST,
        "/api/schema/infer",
        Some(json!({ "data": PERSON_TURTLE, "nodeSelector": "ex:nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!(-32005));

    let (status, body) = send(router(), Method::GET, "/api/formats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["dataFormats"].as_array().unwrap().iter().any(|format| format == "Turtle"));
}

#[tokio::test]
async fn disabled_tools_are_forbidden() {
    let config = ServerConfig {
        enabled_tools: Some(HashSet::from(["validate".to_string()])),
        ..ServerConfig::default()
    };
    let router = router_with(config, MapFetcher::new(), CancellationToken::new());
    let (status, body) = send(router, Method::GET, "/api/formats", None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!(-32014));
}

#[tokio::test]
async fn probes_follow_the_shutdown_token() {
    let token = CancellationToken::new();
    let router = router_with(ServerConfig::default(), MapFetcher::new(), token.clone());

    let (status, _) = send(router.clone(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(router.clone(), Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], json!(true));

    token.cancel();
    let (status, body) = send(router.clone(), Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["not_ready"], json!(["lifecycle"]));
    let (status, _) = send(router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    let (status, body) = send(router(), Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("rdfshape_validations"));
}
