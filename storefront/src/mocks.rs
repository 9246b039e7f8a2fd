//! In-memory doubles of the backend, router and storage.
//!
//! Used by the crate's own tests and integration tests; every double records
//! what it was asked so tests can assert on call counts.

use crate::api::{
    CreateOrderRequest, CreatedOrder, OrdersApi, PaymentInitRequest, PaymentInitResponse,
    PaymentVerification, PaymentsApi,
};
use crate::checkout::PurchaseSink;
use crate::error::{ApiError, StorageError};
use crate::navigation::{Navigator, Route};
use crate::storage::{ClientStorage, MemoryStorage};
use crate::types::{Order, OrderId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct BackendState {
    created: Result<CreatedOrder, ApiError>,
    create_delay: Option<Duration>,
    init: Result<PaymentInitResponse, ApiError>,
    verify_script: VecDeque<Result<String, ApiError>>,
    orders: Result<Vec<Order>, ApiError>,
    list_delay: Option<Duration>,
    create_requests: Vec<CreateOrderRequest>,
    init_requests: Vec<(OrderId, PaymentInitRequest)>,
    verify_calls: usize,
    list_calls: usize,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            created: Ok(CreatedOrder {
                order_id: OrderId::new("order-1"),
            }),
            create_delay: None,
            init: Ok(PaymentInitResponse {
                mode: Some("direct".to_string()),
                ..PaymentInitResponse::default()
            }),
            verify_script: VecDeque::new(),
            orders: Ok(Vec::new()),
            list_delay: None,
            create_requests: Vec::new(),
            init_requests: Vec::new(),
            verify_calls: 0,
            list_calls: 0,
        }
    }
}

/// Scripted order and payment backend
///
/// Defaults: order creation succeeds with id `order-1`, initialization asks
/// for a direct charge, verification reports `pending` once the script runs
/// out, and the order list is empty.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<BackendState>,
}

impl MockBackend {
    /// Backend with the defaults above
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Order creation returns `order_id`
    #[must_use]
    pub fn with_created_order(self, order_id: &str) -> Self {
        lock(&self.state).created = Ok(CreatedOrder {
            order_id: OrderId::new(order_id),
        });
        self
    }

    /// Order creation is refused with `message` (HTTP 422)
    #[must_use]
    pub fn rejecting_orders(self, message: &str) -> Self {
        lock(&self.state).created = Err(ApiError::Rejected {
            status: 422,
            message: Some(message.to_string()),
            errors: Vec::new(),
        });
        self
    }

    /// Order creation fails with `error`
    #[must_use]
    pub fn failing_orders(self, error: ApiError) -> Self {
        lock(&self.state).created = Err(error);
        self
    }

    /// Order creation answers after `delay`
    #[must_use]
    pub fn with_create_delay(self, delay: Duration) -> Self {
        lock(&self.state).create_delay = Some(delay);
        self
    }

    /// Initialization returns `response`
    #[must_use]
    pub fn with_init_response(self, response: PaymentInitResponse) -> Self {
        lock(&self.state).init = Ok(response);
        self
    }

    /// Initialization returns a hosted checkout page
    #[must_use]
    pub fn redirecting_to(self, checkout_url: &str) -> Self {
        self.with_init_response(PaymentInitResponse {
            checkout_url: Some(checkout_url.to_string()),
            ..PaymentInitResponse::default()
        })
    }

    /// Initialization fails with `error`
    #[must_use]
    pub fn failing_init(self, error: ApiError) -> Self {
        lock(&self.state).init = Err(error);
        self
    }

    /// Verification answers these statuses in order, then `pending` forever
    #[must_use]
    pub fn with_verify_script(self, script: Vec<Result<&str, ApiError>>) -> Self {
        lock(&self.state).verify_script = script
            .into_iter()
            .map(|step| step.map(str::to_string))
            .collect();
        self
    }

    /// Order listing returns `orders`
    #[must_use]
    pub fn with_orders(self, orders: Vec<Order>) -> Self {
        self.set_orders(orders);
        self
    }

    /// Order listing fails with `error`
    #[must_use]
    pub fn failing_list(self, error: ApiError) -> Self {
        lock(&self.state).orders = Err(error);
        self
    }

    /// Order listing answers after `delay`
    #[must_use]
    pub fn with_list_delay(self, delay: Duration) -> Self {
        lock(&self.state).list_delay = Some(delay);
        self
    }

    /// Replace the orders returned from now on
    pub fn set_orders(&self, orders: Vec<Order>) {
        lock(&self.state).orders = Ok(orders);
    }

    /// Number of `create_order` calls
    #[must_use]
    pub fn create_calls(&self) -> usize {
        lock(&self.state).create_requests.len()
    }

    /// Last order creation request
    #[must_use]
    pub fn last_create_request(&self) -> Option<CreateOrderRequest> {
        lock(&self.state).create_requests.last().cloned()
    }

    /// Number of `initialize` calls
    #[must_use]
    pub fn init_calls(&self) -> usize {
        lock(&self.state).init_requests.len()
    }

    /// Last initialization request with its order id
    #[must_use]
    pub fn last_init_request(&self) -> Option<(OrderId, PaymentInitRequest)> {
        lock(&self.state).init_requests.last().cloned()
    }

    /// Number of `verify` calls
    #[must_use]
    pub fn verify_calls(&self) -> usize {
        lock(&self.state).verify_calls
    }

    /// Number of `list_orders` calls
    #[must_use]
    pub fn list_calls(&self) -> usize {
        lock(&self.state).list_calls
    }
}

#[async_trait]
impl OrdersApi for MockBackend {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<CreatedOrder, ApiError> {
        let (result, delay) = {
            let mut state = lock(&self.state);
            state.create_requests.push(request);
            (state.created.clone(), state.create_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        let (result, delay) = {
            let mut state = lock(&self.state);
            state.list_calls += 1;
            (state.orders.clone(), state.list_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn get_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let state = lock(&self.state);
        let orders = state.orders.as_ref().map_err(Clone::clone)?;

        orders
            .iter()
            .find(|order| &order.id == id)
            .cloned()
            .ok_or_else(|| ApiError::Rejected {
                status: 404,
                message: Some("Order not found".to_string()),
                errors: Vec::new(),
            })
    }
}

#[async_trait]
impl PaymentsApi for MockBackend {
    async fn initialize(
        &self,
        order_id: &OrderId,
        request: PaymentInitRequest,
    ) -> Result<PaymentInitResponse, ApiError> {
        let mut state = lock(&self.state);
        state.init_requests.push((order_id.clone(), request));
        state.init.clone()
    }

    async fn verify(&self, order_id: &OrderId) -> Result<PaymentVerification, ApiError> {
        let mut state = lock(&self.state);
        state.verify_calls += 1;

        let status = state
            .verify_script
            .pop_front()
            .unwrap_or_else(|| Ok("pending".to_string()))?;

        Ok(PaymentVerification {
            payment_reference: (status == "paid" || status == "completed")
                .then(|| format!("REF-{order_id}")),
            status,
            order_id: order_id.clone(),
        })
    }
}

/// Navigator that remembers every redirect
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    /// Navigator with no redirects yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirects in the order they were requested
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        lock(&self.routes).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: Route) {
        lock(&self.routes).push(route);
    }
}

/// Purchase sink that remembers every confirmed payment
#[derive(Debug, Default)]
pub struct RecordingPurchases {
    payments: Mutex<Vec<(OrderId, Option<String>)>>,
}

impl RecordingPurchases {
    /// Sink with nothing recorded
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirmed payments as `(order, reference)`
    #[must_use]
    pub fn payments(&self) -> Vec<(OrderId, Option<String>)> {
        lock(&self.payments).clone()
    }
}

#[async_trait]
impl PurchaseSink for RecordingPurchases {
    async fn record_payment(&self, order_id: OrderId, reference: Option<String>) {
        lock(&self.payments).push((order_id, reference));
    }
}

/// Memory storage with slow reads and countable writes
#[derive(Debug, Default)]
pub struct SlowStorage {
    inner: MemoryStorage,
    read_delay: Duration,
    fail_writes: bool,
    writes: Mutex<usize>,
}

impl SlowStorage {
    /// Storage whose reads take `read_delay`
    #[must_use]
    pub fn new(read_delay: Duration) -> Self {
        Self {
            read_delay,
            ..Self::default()
        }
    }

    /// Storage holding `value` under `key`, read after `read_delay`
    #[must_use]
    pub fn with_blob(key: &str, value: impl Into<String>, read_delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::with_blob(key, value),
            read_delay,
            ..Self::default()
        }
    }

    /// Make every write fail
    #[must_use]
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Number of `set`/`remove` calls, failed ones included
    #[must_use]
    pub fn writes(&self) -> usize {
        *lock(&self.writes)
    }

    /// Current blob under `key`
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.peek(key)
    }

    fn record_write(&self) -> Result<(), StorageError> {
        *lock(&self.writes) += 1;
        if self.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClientStorage for SlowStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        tokio::time::sleep(self.read_delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.record_write()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.record_write()?;
        self.inner.remove(key).await
    }
}
