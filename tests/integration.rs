use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use courier_dispatch::api::rest::router;
use courier_dispatch::config::Config;
use courier_dispatch::engine::dispatch::run_dispatch_worker;
use courier_dispatch::geo::offset_north_km;
use courier_dispatch::models::courier::GeoPoint;
use courier_dispatch::state::AppState;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

fn setup() -> (axum::Router, mpsc::Receiver<Uuid>) {
    let (state, rx) = AppState::new(&Config::default());
    (router(Arc::new(state)), rx)
}

/// Router with the dispatch worker running, so new orders get offered.
fn setup_with_worker() -> (axum::Router, Arc<AppState>) {
    let (state, rx) = AppState::new(&Config::default());
    let shared = Arc::new(state);
    tokio::spawn(run_dispatch_worker(shared.clone(), rx));
    (router(shared.clone()), shared)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register_store(app: &axum::Router, lat: f64, lng: f64) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/stores",
            json!({ "name": "Corner Shop", "location": { "lat": lat, "lng": lng } }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn courier_online(app: &axum::Router, id: Uuid, at: GeoPoint) {
    let res = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/couriers/{id}/presence"),
            json!({ "lat": at.lat, "lng": at.lng, "online": true }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn create_order(app: &axum::Router, store_id: &str, customer_id: Uuid) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "store_id": store_id,
                "customer_id": customer_id,
                "items": [{ "product_id": Uuid::new_v4(), "quantity": 1 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

/// Polls until the courier sees a pending offer for some order.
async fn wait_for_offer(app: &axum::Router, courier_id: Uuid) -> Value {
    for _ in 0..100 {
        let res = app
            .clone()
            .oneshot(get_request(&format!("/couriers/{courier_id}/offers")))
            .await
            .unwrap();
        let offers = body_json(res).await;
        if let Some(first) = offers.as_array().and_then(|list| list.first()) {
            return first.clone();
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    panic!("courier {courier_id} never received an offer");
}

async fn respond(
    app: &axum::Router,
    order_id: &str,
    courier_id: Uuid,
    decision: &str,
) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/respond"),
            json!({ "courier_id": courier_id, "decision": decision }),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _rx) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["couriers_online"], 0);
    assert_eq!(body["pending_offers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _rx) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("orders_in_queue"));
    assert!(body.contains("couriers_online"));
}

#[tokio::test]
async fn store_registration_validates_coordinates() {
    let (app, _rx) = setup();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/stores",
            json!({ "name": "Nowhere", "location": { "lat": 123.0, "lng": 0.0 } }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let id = register_store(&app, 52.52, 13.405).await;
    let res = app
        .oneshot(get_request(&format!("/stores/{id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["location"]["lat"], 52.52);
}

#[tokio::test]
async fn presence_update_is_readable_and_searchable() {
    let (app, _rx) = setup();
    let origin = GeoPoint::new(52.52, 13.405);
    let near = Uuid::from_u128(1);
    let far = Uuid::from_u128(2);
    courier_online(&app, far, offset_north_km(&origin, 4.0)).await;
    courier_online(&app, near, offset_north_km(&origin, 1.0)).await;

    let res = app
        .clone()
        .oneshot(get_request(&format!("/couriers/{near}/presence")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["online"], true);

    let res = app
        .oneshot(get_request("/couriers/nearby?lat=52.52&lng=13.405&radius_km=5"))
        .await
        .unwrap();
    let nearby = body_json(res).await;
    let ids: Vec<&str> = nearby
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["courier_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![near.to_string(), far.to_string()]);
}

#[tokio::test]
async fn unknown_courier_presence_returns_404() {
    let (app, _rx) = setup();
    let res = app
        .oneshot(get_request(&format!("/couriers/{}/presence", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _rx) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_order_for_unknown_store_returns_404() {
    let (app, _rx) = setup();
    let res = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "store_id": Uuid::new_v4(),
                "customer_id": Uuid::new_v4(),
                "items": [{ "product_id": Uuid::new_v4(), "quantity": 1 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_order_returns_pending_with_quote() {
    let (app, _rx) = setup();
    let store_id = register_store(&app, 0.0, 0.0).await;
    let dropoff = offset_north_km(&GeoPoint::new(0.0, 0.0), 3.0);

    let res = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "store_id": store_id,
                "customer_id": Uuid::new_v4(),
                "items": [{ "product_id": Uuid::new_v4(), "quantity": 2 }],
                "dropoff": { "lat": dropoff.lat, "lng": dropoff.lng }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "pending");
    assert!(body["courier_id"].is_null());
    assert_eq!(body["delivery"]["distance_km"], 3.0);
    assert_eq!(body["delivery"]["fee"], 15.0);
}

#[tokio::test]
async fn full_delivery_flow() {
    let (app, _state) = setup_with_worker();
    let store_id = register_store(&app, 0.0, 0.0).await;
    let store_uuid: Uuid = store_id.parse().unwrap();
    let customer_id = Uuid::new_v4();
    let courier_id = Uuid::from_u128(42);
    courier_online(&app, courier_id, offset_north_km(&GeoPoint::new(0.0, 0.0), 1.0)).await;

    let order_id = create_order(&app, &store_id, customer_id).await;
    let offer = wait_for_offer(&app, courier_id).await;
    assert_eq!(offer["order_id"], order_id);
    assert_eq!(offer["outcome"], "pending");

    let res = respond(&app, &order_id, courier_id, "accept").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "assigned");
    assert_eq!(body["order"]["status"], "assigned");
    assert_eq!(body["order"]["courier_id"], courier_id.to_string());

    let steps = [
        (format!("/orders/{order_id}/store/accept"), json!({ "store_id": store_uuid }), "preparing"),
        (format!("/orders/{order_id}/pickup"), json!({ "courier_id": courier_id }), "on_the_way"),
        (
            format!("/orders/{order_id}/confirm-delivery"),
            json!({ "actor": { "role": "customer", "id": customer_id } }),
            "delivered",
        ),
    ];
    for (uri, payload, expected) in steps {
        let res = app
            .clone()
            .oneshot(json_request("POST", &uri, payload))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{uri}");
        assert_eq!(body_json(res).await["status"], expected);
    }

    let res = app
        .oneshot(get_request(&format!("/orders/{order_id}/offers")))
        .await
        .unwrap();
    let history = body_json(res).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["outcome"], "accepted");
}

#[tokio::test]
async fn second_accept_and_stranger_accept_are_refused() {
    let (app, _state) = setup_with_worker();
    let store_id = register_store(&app, 0.0, 0.0).await;
    let courier_id = Uuid::from_u128(1);
    courier_online(&app, courier_id, offset_north_km(&GeoPoint::new(0.0, 0.0), 1.0)).await;

    let order_id = create_order(&app, &store_id, Uuid::new_v4()).await;
    wait_for_offer(&app, courier_id).await;

    let stranger = respond(&app, &order_id, Uuid::from_u128(2), "accept").await;
    assert_eq!(stranger.status(), StatusCode::NOT_FOUND);

    let first = respond(&app, &order_id, courier_id, "accept").await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = respond(&app, &order_id, courier_id, "accept").await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reject_fails_over_and_repeat_reject_is_ignored() {
    let (app, _state) = setup_with_worker();
    let store_id = register_store(&app, 0.0, 0.0).await;
    let origin = GeoPoint::new(0.0, 0.0);
    let first = Uuid::from_u128(1);
    let second = Uuid::from_u128(2);
    courier_online(&app, first, offset_north_km(&origin, 1.0)).await;
    courier_online(&app, second, offset_north_km(&origin, 2.0)).await;

    let order_id = create_order(&app, &store_id, Uuid::new_v4()).await;
    wait_for_offer(&app, first).await;

    let res = respond(&app, &order_id, first, "reject").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["next"]["result"], "offered");
    assert_eq!(body["next"]["courier_id"], second.to_string());

    let res = respond(&app, &order_id, first, "reject").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "ignored");

    let res = app
        .oneshot(get_request(&format!("/orders/{order_id}/offers")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn lifecycle_errors_map_to_status_codes() {
    let (app, _rx) = setup();
    let store_id = register_store(&app, 0.0, 0.0).await;
    let customer_id = Uuid::new_v4();
    let order_id = create_order(&app, &store_id, customer_id).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            json!({ "customer_id": Uuid::new_v4() }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/store/accept"),
            json!({ "store_id": store_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            json!({ "customer_id": customer_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancel_reason"], "customer");

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/dispatch"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn redispatch_picks_up_courier_that_came_online_later() {
    let (app, state) = setup_with_worker();
    let store_id = register_store(&app, 0.0, 0.0).await;
    let order_id = create_order(&app, &store_id, Uuid::new_v4()).await;

    // Let the worker run the first, empty, round.
    let exhausted = state
        .metrics
        .dispatch_rounds_total
        .with_label_values(&["exhausted"]);
    for _ in 0..100 {
        if exhausted.get() == 1 {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    }
    assert_eq!(exhausted.get(), 1);

    let late = Uuid::from_u128(5);
    courier_online(&app, late, offset_north_km(&GeoPoint::new(0.0, 0.0), 2.0)).await;

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/dispatch"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["result"], "offered");
    assert_eq!(body["courier_id"], late.to_string());
}

#[tokio::test]
async fn sweep_endpoint_returns_report() {
    let (app, _rx) = setup();
    let store_id = register_store(&app, 0.0, 0.0).await;
    create_order(&app, &store_id, Uuid::new_v4()).await;

    let res = app
        .oneshot(json_request("POST", "/reconciler/sweep", json!({})))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let report = body_json(res).await;
    assert_eq!(report["scanned"], 1);
    assert_eq!(report["auto_cancelled"], 0);
    assert_eq!(report["released"], 0);
    assert_eq!(report["failed"], 0);
}
