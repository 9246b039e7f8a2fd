//! End-to-end checkout sessions against the in-memory backend.
//!
//! Every test runs with paused tokio time: countdown ticks and verification
//! polls advance deterministically.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use boxoffice_storefront::api::PaymentInitResponse;
use boxoffice_storefront::config::CheckoutConfig;
use boxoffice_storefront::error::ApiError;
use boxoffice_storefront::mocks::{MockBackend, RecordingNavigator, RecordingPurchases};
use boxoffice_storefront::navigation::Route;
use boxoffice_storefront::storage::MemoryStorage;
use boxoffice_storefront::types::{
    BillingInfo, EventSnapshot, Money, OrderId, OrderLine, PaymentNetwork, TicketType, TicketTypeId,
};
use boxoffice_storefront::{
    CartStore, CheckoutEnvironment, CheckoutError, CheckoutPhase, CheckoutSession,
};
use boxoffice_testing::test_clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const TEARDOWN: Duration = Duration::from_secs(1);

struct Harness {
    backend: Arc<MockBackend>,
    navigator: Arc<RecordingNavigator>,
    purchases: Arc<RecordingPurchases>,
    cart: CartStore,
    session: CheckoutSession,
}

fn event() -> EventSnapshot {
    EventSnapshot {
        id: "ev-1".into(),
        title: "Highlife Night".to_string(),
        ticket_types: vec![TicketType {
            id: TicketTypeId::new("tt-vip"),
            name: "VIP".to_string(),
            price: Money::from_minor(15_000),
            ..TicketType::default()
        }],
        ..EventSnapshot::default()
    }
}

fn billing() -> BillingInfo {
    BillingInfo {
        name: "Ama Mensah".to_string(),
        email: "ama@example.com".to_string(),
        phone: "0244123456".to_string(),
    }
}

fn config(session_seconds: u32) -> CheckoutConfig {
    CheckoutConfig {
        session_seconds,
        ..CheckoutConfig::default()
    }
}

async fn start(backend: MockBackend, config: &CheckoutConfig, vip_tickets: u32) -> Harness {
    let backend = Arc::new(backend);
    let navigator = Arc::new(RecordingNavigator::new());
    let purchases = Arc::new(RecordingPurchases::new());

    let cart = CartStore::new(Arc::new(MemoryStorage::new()), Arc::new(test_clock()));
    cart.hydrate().await.unwrap();
    if vip_tickets > 0 {
        cart.add_line(event(), BTreeMap::from([("VIP".to_string(), vip_tickets)]))
            .await
            .unwrap();
    }

    let environment = CheckoutEnvironment::new(
        backend.clone(),
        backend.clone(),
        navigator.clone(),
        Arc::new(cart.clone()),
        purchases.clone(),
        config,
    );
    let session = CheckoutSession::start(config, environment, cart.clone())
        .await
        .unwrap();

    Harness {
        backend,
        navigator,
        purchases,
        cart,
        session,
    }
}

async fn submit(harness: &Harness) {
    harness.session.update_billing(billing()).await.unwrap();
    harness.session.submit().await.unwrap();
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[tokio::test(start_paused = true)]
async fn polling_stops_exactly_at_paid() {
    let backend = MockBackend::new().with_verify_script(vec![Ok("pending"), Ok("pending"), Ok("paid")]);
    let harness = start(backend, &CheckoutConfig::default(), 2).await;

    submit(&harness).await;
    advance(Duration::from_millis(9_500)).await;

    assert_eq!(harness.backend.verify_calls(), 3);
    assert_eq!(harness.session.phase().await, CheckoutPhase::Succeeded);

    // A full interval later nothing else was asked
    advance(Duration::from_secs(4)).await;
    assert_eq!(harness.backend.verify_calls(), 3);

    let state = harness.session.snapshot().await;
    assert!(state.payment_complete);
    assert!(!state.timer_running);
    assert_eq!(state.payment_reference.as_deref(), Some("REF-order-1"));

    assert!(harness.cart.is_empty().await);
    assert_eq!(
        harness.purchases.payments(),
        vec![(OrderId::new("order-1"), Some("REF-order-1".to_string()))]
    );
    // The cart emptied by success does not bounce the buyer
    assert!(harness.navigator.routes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submission_sends_flattened_cart_and_billing() {
    let harness = start(MockBackend::new(), &CheckoutConfig::default(), 3).await;

    submit(&harness).await;
    advance(Duration::from_millis(10)).await;

    let request = harness.backend.last_create_request().unwrap();
    assert_eq!(
        request.items,
        vec![OrderLine {
            ticket_type_id: TicketTypeId::new("tt-vip"),
            quantity: 3
        }]
    );
    assert_eq!(request.billing, billing());

    let (order_id, init) = harness.backend.last_init_request().unwrap();
    assert_eq!(order_id, OrderId::new("order-1"));
    assert!(init.direct_charge);
    assert_eq!(init.network, PaymentNetwork::Mtn);
    assert_eq!(init.phone, "0244123456");
    assert_eq!(harness.session.phase().await, CheckoutPhase::Polling);
}

#[tokio::test(start_paused = true)]
async fn card_payments_are_not_direct_charges() {
    let harness = start(MockBackend::new(), &CheckoutConfig::default(), 1).await;

    harness.session.select_network(PaymentNetwork::Card).await.unwrap();
    submit(&harness).await;
    advance(Duration::from_millis(10)).await;

    let (_, init) = harness.backend.last_init_request().unwrap();
    assert!(!init.direct_charge);
    assert_eq!(init.network, PaymentNetwork::Card);
}

#[tokio::test(start_paused = true)]
async fn expiry_redirects_once_and_never_polls() {
    let harness = start(MockBackend::new(), &config(1), 2).await;

    submit(&harness).await;
    advance(Duration::from_secs(10)).await;

    assert_eq!(harness.navigator.routes(), vec![Route::Cart]);
    assert_eq!(harness.backend.verify_calls(), 0);

    let state = harness.session.snapshot().await;
    assert_eq!(state.phase, CheckoutPhase::Expired);
    assert_eq!(state.error, Some(CheckoutError::SessionExpired));
    assert_eq!(state.remaining_display(), "00:00");
}

#[tokio::test(start_paused = true)]
async fn expiry_stops_a_running_poll_loop() {
    let harness = start(MockBackend::new(), &config(4), 2).await;

    submit(&harness).await;
    advance(Duration::from_secs(20)).await;

    // One poll at 3s, expiry at 4s, nothing after
    assert_eq!(harness.backend.verify_calls(), 1);
    assert_eq!(harness.navigator.routes(), vec![Route::Cart]);
    assert_eq!(harness.session.phase().await, CheckoutPhase::Expired);
}

#[tokio::test(start_paused = true)]
async fn countdown_runs_while_filling_the_form() {
    let harness = start(MockBackend::new(), &CheckoutConfig::default(), 1).await;

    advance(Duration::from_millis(61_500)).await;

    assert_eq!(harness.session.remaining_display().await, "28:59");
    assert_eq!(harness.session.phase().await, CheckoutPhase::AwaitingSubmission);
}

#[tokio::test(start_paused = true)]
async fn zero_intervals_run_at_default_pace() {
    let config = CheckoutConfig {
        poll_interval_ms: 0,
        tick_ms: 0,
        ..CheckoutConfig::default()
    };
    let backend = MockBackend::new().with_verify_script(vec![Ok("pending"), Ok("paid")]);
    let harness = start(backend, &config, 1).await;

    advance(Duration::from_millis(1_500)).await;
    assert_eq!(harness.session.remaining_display().await, "29:59");
    assert_eq!(harness.session.phase().await, CheckoutPhase::AwaitingSubmission);

    submit(&harness).await;
    advance(Duration::from_millis(1_000)).await;
    assert_eq!(harness.backend.verify_calls(), 0);

    advance(Duration::from_millis(2_500)).await;
    assert_eq!(harness.backend.verify_calls(), 1);

    advance(Duration::from_secs(3)).await;
    assert_eq!(harness.backend.verify_calls(), 2);
    assert_eq!(harness.session.phase().await, CheckoutPhase::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn empty_cart_redirects_on_entry() {
    let harness = start(MockBackend::new(), &CheckoutConfig::default(), 0).await;
    advance(Duration::from_millis(10)).await;

    assert_eq!(harness.navigator.routes(), vec![Route::Cart]);
    assert_eq!(harness.session.phase().await, CheckoutPhase::Abandoned);

    // No countdown was started
    advance(Duration::from_secs(5)).await;
    assert_eq!(harness.session.remaining_display().await, "30:00");
}

#[tokio::test(start_paused = true)]
async fn emptying_the_cart_mid_checkout_redirects() {
    let harness = start(MockBackend::new(), &CheckoutConfig::default(), 2).await;

    harness.cart.clear().await.unwrap();
    advance(Duration::from_millis(10)).await;

    assert_eq!(harness.navigator.routes(), vec![Route::Cart]);
    assert_eq!(harness.session.phase().await, CheckoutPhase::Abandoned);
}

#[tokio::test(start_paused = true)]
async fn incomplete_billing_never_reaches_the_backend() {
    let harness = start(MockBackend::new(), &CheckoutConfig::default(), 2).await;

    harness
        .session
        .update_billing(BillingInfo {
            name: "Ama Mensah".to_string(),
            ..BillingInfo::default()
        })
        .await
        .unwrap();
    harness.session.submit().await.unwrap();
    advance(Duration::from_millis(10)).await;

    assert_eq!(harness.backend.create_calls(), 0);
    assert_eq!(
        harness.session.error().await,
        Some(CheckoutError::Validation("Please fill in: email, phone".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_order_keeps_cart_and_allows_retry() {
    let backend = MockBackend::new().rejecting_orders("VIP is sold out");
    let harness = start(backend, &CheckoutConfig::default(), 2).await;

    submit(&harness).await;
    advance(Duration::from_millis(10)).await;

    assert_eq!(harness.session.phase().await, CheckoutPhase::Failed);
    assert_eq!(
        harness.session.error().await,
        Some(CheckoutError::OrderCreation("VIP is sold out".to_string()))
    );
    assert_eq!(harness.cart.count().await, 2);
    assert_eq!(harness.backend.init_calls(), 0);

    harness.session.submit().await.unwrap();
    advance(Duration::from_millis(10)).await;
    assert_eq!(harness.backend.create_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_on_create_is_generic() {
    let backend = MockBackend::new().failing_orders(ApiError::Timeout);
    let harness = start(backend, &CheckoutConfig::default(), 1).await;

    submit(&harness).await;
    advance(Duration::from_millis(10)).await;

    let Some(CheckoutError::OrderCreation(message)) = harness.session.error().await else {
        panic!("expected an order creation error");
    };
    assert!(!message.is_empty());
    assert_eq!(harness.cart.count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn checkout_url_hands_off_to_the_gateway() {
    let backend = MockBackend::new().redirecting_to("https://pay.example/checkout/abc");
    let harness = start(backend, &CheckoutConfig::default(), 2).await;

    submit(&harness).await;
    advance(Duration::from_secs(10)).await;

    assert_eq!(
        harness.navigator.routes(),
        vec![Route::External("https://pay.example/checkout/abc".to_string())]
    );
    assert_eq!(harness.session.phase().await, CheckoutPhase::RedirectingExternal);
    assert_eq!(harness.backend.verify_calls(), 0);
    // The backend owns the outcome; the cart stays until it reports back
    assert_eq!(harness.cart.count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn unrecognized_init_response_fails() {
    let backend = MockBackend::new().with_init_response(PaymentInitResponse {
        mode: Some("redirect".to_string()),
        ..PaymentInitResponse::default()
    });
    let harness = start(backend, &CheckoutConfig::default(), 1).await;

    submit(&harness).await;
    advance(Duration::from_millis(10)).await;

    assert_eq!(harness.session.phase().await, CheckoutPhase::Failed);
    assert!(matches!(
        harness.session.error().await,
        Some(CheckoutError::PaymentInit(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_payment_keeps_cart() {
    let backend = MockBackend::new().with_verify_script(vec![Err(ApiError::Timeout), Ok("failed")]);
    let harness = start(backend, &CheckoutConfig::default(), 2).await;

    submit(&harness).await;
    advance(Duration::from_secs(7)).await;

    assert_eq!(harness.backend.verify_calls(), 2);
    assert_eq!(harness.session.phase().await, CheckoutPhase::Failed);
    assert!(matches!(
        harness.session.error().await,
        Some(CheckoutError::PaymentFailed(_))
    ));
    assert_eq!(harness.cart.count().await, 2);
    assert!(harness.purchases.payments().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_poll_stops_polling() {
    let harness = start(MockBackend::new(), &CheckoutConfig::default(), 2).await;

    submit(&harness).await;
    advance(Duration::from_millis(4_000)).await;
    assert_eq!(harness.backend.verify_calls(), 1);

    harness.session.cancel().await.unwrap();
    advance(Duration::from_secs(10)).await;

    assert_eq!(harness.backend.verify_calls(), 1);
    assert_eq!(harness.navigator.routes(), vec![Route::Cart]);
    assert_eq!(harness.session.phase().await, CheckoutPhase::Abandoned);
}

#[tokio::test(start_paused = true)]
async fn teardown_drops_results_that_arrive_late() {
    let backend = MockBackend::new().with_create_delay(Duration::from_secs(5));
    let harness = start(backend, &CheckoutConfig::default(), 2).await;

    submit(&harness).await;
    advance(Duration::from_secs(1)).await;
    assert_eq!(harness.session.phase().await, CheckoutPhase::Creating);

    harness.session.teardown(TEARDOWN).await.unwrap();
    advance(Duration::from_secs(10)).await;

    assert!(!harness.session.is_live());
    assert_eq!(harness.session.phase().await, CheckoutPhase::Creating);
    assert_eq!(harness.backend.init_calls(), 0);
    assert!(harness.navigator.routes().is_empty());
    assert!(harness.session.submit().await.is_err());

    // Teardown twice is harmless
    harness.session.teardown(TEARDOWN).await.unwrap();
}
