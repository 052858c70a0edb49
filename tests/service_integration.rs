mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{build_app, counter_value, wait_until, FakeConnector, QueryBehavior};
use tetherd::connection::ConnectionState;

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("response body is not UTF-8")
}

#[tokio::test]
async fn welcome_is_unavailable_while_the_backend_is_down() {
    let (app, state) = build_app(FakeConnector::always_failing());

    let response = app.oneshot(get("/welcome")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(counter_value(&state, "tetherd_web_app_calls"), 0);
    assert_eq!(counter_value(&state, "tetherd_backend_unavailable_total"), 1);
    state.supervisor.stop();
}

#[tokio::test]
async fn welcome_serves_the_seeded_record_once_connected() {
    let (app, state) = build_app(FakeConnector::new(
        0,
        QueryBehavior::User("Pedro Tavares".to_string()),
    ));

    state
        .supervisor
        .subscribe()
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();

    let response = app.oneshot(get("/welcome")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "Hello Client! There is one record in the database for Pedro Tavares"
    );
    assert_eq!(counter_value(&state, "tetherd_web_app_calls"), 1);
    state.supervisor.stop();
}

#[tokio::test]
async fn an_empty_database_is_a_server_error_not_an_unavailable() {
    let (app, state) = build_app(FakeConnector::new(0, QueryBehavior::Empty));

    state
        .supervisor
        .subscribe()
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();

    let response = app.oneshot(get("/welcome")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(counter_value(&state, "tetherd_web_app_calls"), 0);
    state.supervisor.stop();
}

#[tokio::test]
async fn a_dead_handle_surfaces_as_unavailable_and_forces_a_reconnect() {
    let (app, state) = build_app(FakeConnector::new(0, QueryBehavior::ConnectionLost));

    state
        .supervisor
        .subscribe()
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();

    let response = app.oneshot(get("/welcome")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let state_for_wait = state.clone();
    wait_until("the supervisor reconnects", move || {
        counter_value(&state_for_wait, "tetherd_db_connection_successes") >= 2
    })
    .await;
    state.supervisor.stop();
}

#[tokio::test]
async fn metrics_are_served_whatever_the_connection_state() {
    let (app, state) = build_app(FakeConnector::always_failing());

    let state_for_wait = state.clone();
    wait_until("a failed attempt completes", move || {
        counter_value(&state_for_wait, "tetherd_db_connection_failures") >= 1
    })
    .await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok()),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );

    let body = body_string(response).await;
    assert!(body.contains("# TYPE tetherd_db_connection_failures counter"));
    assert!(body.contains("tetherd_db_connection_successes 0"));
    // The scrape itself is counted before rendering.
    assert!(body.contains("tetherd_metrics_read_total 1"));

    let second = body_string(app.oneshot(get("/metrics")).await.unwrap()).await;
    assert!(second.contains("tetherd_metrics_read_total 2"));
    state.supervisor.stop();
}

#[tokio::test]
async fn every_request_lands_in_the_duration_histogram() {
    let (app, state) = build_app(FakeConnector::always_failing());

    let response = app.clone().oneshot(get("/welcome")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_string(app.oneshot(get("/metrics")).await.unwrap()).await;
    assert!(body.contains(
        "tetherd_http_requests_total{method=\"GET\",route=\"/welcome\",code=\"503\"} 1"
    ));
    assert!(body.contains(
        "tetherd_http_request_duration_ms_count{method=\"GET\",route=\"/welcome\",code=\"503\"} 1"
    ));
    state.supervisor.stop();
}

#[tokio::test]
async fn health_check_reports_ok() {
    let (app, state) = build_app(FakeConnector::always_failing());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
    state.supervisor.stop();
}
