//! `HttpBackend` against a stub HTTP server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use boxoffice_storefront::api::{
    CreateOrderRequest, HttpBackend, OrdersApi, PaymentInitOutcome, PaymentInitRequest, PaymentsApi,
    VerificationStatus,
};
use boxoffice_storefront::auth::{StaticAuth, UserIdentity};
use boxoffice_storefront::checkout::{PaymentConfirmation, PaymentOutcome, PollingConfirmation};
use boxoffice_storefront::config::ApiConfig;
use boxoffice_storefront::error::ApiError;
use boxoffice_storefront::types::{BillingInfo, Money, OrderId, OrderLine, OrderStatus, PaymentNetwork, TicketTypeId};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HttpBackend {
    let config = ApiConfig {
        base_url: format!("{}/", server.uri()),
        timeout_secs: 5,
    };
    let auth = StaticAuth::signed_in(UserIdentity::new("u-1"), Some("secret-token".to_string()));
    HttpBackend::new(&config, Arc::new(auth)).unwrap()
}

fn order_request() -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![OrderLine {
            ticket_type_id: TicketTypeId::new("tt-vip"),
            quantity: 2,
        }],
        billing: BillingInfo {
            name: "Ama Mensah".to_string(),
            email: "ama@example.com".to_string(),
            phone: "0244123456".to_string(),
        },
    }
}

#[tokio::test]
async fn create_order_posts_flat_body_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({
            "items": [{ "ticket_type_id": "tt-vip", "quantity": 2 }],
            "name": "Ama Mensah",
            "email": "ama@example.com",
            "phone": "0244123456"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "success": true, "orderId": 42 })))
        .expect(1)
        .mount(&server)
        .await;

    let created = backend(&server).create_order(order_request()).await.unwrap();

    assert_eq!(created.order_id, OrderId::new("42"));
}

#[tokio::test]
async fn create_order_reads_enveloped_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "order": { "id": "ord_9" } } })))
        .mount(&server)
        .await;

    let created = backend(&server).create_order(order_request()).await.unwrap();

    assert_eq!(created.order_id, OrderId::new("ord_9"));
}

#[tokio::test]
async fn rejected_order_keeps_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "success": false,
            "message": "Only 1 VIP ticket left",
            "errors": { "items": ["quantity exceeds availability"] }
        })))
        .mount(&server)
        .await;

    let error = backend(&server).create_order(order_request()).await.unwrap_err();

    assert!(matches!(error, ApiError::Rejected { status: 422, .. }));
    assert_eq!(error.backend_message().as_deref(), Some("Only 1 VIP ticket left"));
}

#[tokio::test]
async fn success_false_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Event has ended"
        })))
        .mount(&server)
        .await;

    let error = backend(&server).create_order(order_request()).await.unwrap_err();

    assert_eq!(error.backend_message().as_deref(), Some("Event has ended"));
}

#[tokio::test]
async fn unauthorized_is_its_own_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
        .mount(&server)
        .await;

    let error = backend(&server).list_orders().await.unwrap_err();

    assert!(matches!(error, ApiError::Unauthorized));
}

#[tokio::test]
async fn list_orders_unwraps_envelopes_leniently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "orders": [
                    { "id": "A", "status": "PAID", "totalAmount": "300.00", "orderItems": [] },
                    { "id": "B", "status": "pending", "total_amount": 150 },
                    "garbage"
                ]
            }
        })))
        .mount(&server)
        .await;

    let orders = backend(&server).list_orders().await.unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].status, OrderStatus::Paid);
    assert_eq!(orders[0].total_amount, Money::from_minor(30_000));
    assert_eq!(orders[1].id, OrderId::new("B"));
}

#[tokio::test]
async fn get_order_reads_wrapped_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "order": { "id": "A", "status": "paid", "payment_reference": "PAY-A" }
        })))
        .mount(&server)
        .await;

    let order = backend(&server).get_order(&OrderId::new("A")).await.unwrap();

    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_reference.as_deref(), Some("PAY-A"));
}

#[tokio::test]
async fn initialize_sends_order_id_with_the_charge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments/initialize"))
        .and(body_json(json!({
            "order_id": "42",
            "direct_charge": false,
            "network": "CARD",
            "phone": ""
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "authorization_url": "https://pay.example/abc" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = PaymentInitRequest {
        direct_charge: false,
        network: PaymentNetwork::Card,
        phone: String::new(),
    };
    let response = backend(&server)
        .initialize(&OrderId::new("42"), request)
        .await
        .unwrap();

    assert_eq!(
        response.outcome(),
        PaymentInitOutcome::Redirect {
            checkout_url: "https://pay.example/abc".to_string()
        }
    );
}

#[tokio::test]
async fn verify_classifies_gateway_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments/verify/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Completed",
            "reference": "GW-77"
        })))
        .mount(&server)
        .await;

    let verification = backend(&server).verify(&OrderId::new("42")).await.unwrap();

    assert_eq!(verification.classify(), VerificationStatus::Paid);
    assert_eq!(verification.payment_reference.as_deref(), Some("GW-77"));
}

#[tokio::test]
async fn polling_over_http_survives_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments/verify/42"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payments/verify/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payments/verify/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "paid", "payment_reference": "GW-1" })))
        .mount(&server)
        .await;

    let confirmation = PollingConfirmation::new(Arc::new(backend(&server)), Duration::from_millis(20));
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        confirmation.await_terminal_status(&OrderId::new("42")),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        PaymentOutcome::Paid {
            reference: Some("GW-1".to_string())
        }
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
