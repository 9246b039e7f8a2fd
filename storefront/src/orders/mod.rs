//! Order/ticket query facade.
//!
//! A read-side cache of the signed-in user's orders and the tickets derived
//! from them. The cache is never merged: every refresh replaces it with what
//! the backend returned. The facade follows the authentication feed on its
//! own: the first identity it sees and every later change trigger a refresh.

mod reducer;

pub use reducer::{OrdersAction, OrdersEnvironment, OrdersReducer, OrdersState};

use crate::api::OrdersApi;
use crate::auth::{AuthFacade, UserIdentity};
use crate::checkout::PurchaseSink;
use crate::error::QueryError;
use crate::types::{Order, OrderId, OrderStatus, TicketView};
use async_trait::async_trait;
use boxoffice_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;

type OrdersStore = Store<OrdersState, OrdersAction, OrdersEnvironment, OrdersReducer>;

/// Aborts the identity listener once the last facade handle is gone
struct IdentityListener(AbortHandle);

impl Drop for IdentityListener {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to the order cache
///
/// Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct OrderQueryFacade {
    store: OrdersStore,
    api: Arc<dyn OrdersApi>,
    auth: Arc<dyn AuthFacade>,
    listener: Arc<IdentityListener>,
}

impl OrderQueryFacade {
    /// Empty cache over `api`, following `auth` from now on
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(api: Arc<dyn OrdersApi>, auth: Arc<dyn AuthFacade>) -> Self {
        let environment = OrdersEnvironment {
            api: Arc::clone(&api),
            auth: Arc::clone(&auth),
        };
        let store = Store::new(OrdersState::default(), OrdersReducer, environment);
        let listener = tokio::spawn(follow_identity(auth.subscribe(), store.clone())).abort_handle();

        Self {
            store,
            api,
            auth,
            listener: Arc::new(IdentityListener(listener)),
        }
    }

    /// Start re-reading all orders without waiting
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`OrderQueryFacade::shutdown`].
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.store.send(OrdersAction::Refresh).await
    }

    /// Re-read all orders and wait until no refresh is in flight
    ///
    /// A refresh started meanwhile (an identity change, a confirmed payment)
    /// is waited for as well. A failed fetch is not an error here; it shows
    /// up in [`OrderQueryFacade::error`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the backend does not answer in time.
    pub async fn refresh_and_wait(&self, timeout: Duration) -> Result<(), StoreError> {
        let mut actions = self.store.subscribe_actions();
        self.refresh().await?;

        tokio::time::timeout(timeout, async {
            loop {
                if !self.store.state(|s| s.loading).await {
                    return Ok(());
                }

                match actions.recv().await {
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Order observer lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Re-read the authentication state now
    ///
    /// Identity changes are followed without this; it only resynchronizes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`OrderQueryFacade::shutdown`].
    pub async fn auth_changed(&self) -> Result<(), StoreError> {
        let user = self.auth.current_user().map(|user| user.id);
        self.store.send(OrdersAction::AuthChanged { user }).await
    }

    /// Cached orders
    pub async fn orders(&self) -> Vec<Order> {
        self.store.state(|s| s.orders.clone()).await
    }

    /// Tickets of the paid orders
    pub async fn tickets(&self) -> Vec<TicketView> {
        self.store.state(|s| s.tickets.clone()).await
    }

    /// Error of the last refresh
    pub async fn error(&self) -> Option<QueryError> {
        self.store.state(|s| s.error.clone()).await
    }

    /// Whether a refresh is in flight
    pub async fn is_loading(&self) -> bool {
        self.store.state(|s| s.loading).await
    }

    /// Cached orders with `status`; `None` returns them all
    pub async fn get_by_status(&self, status: Option<OrderStatus>) -> Vec<Order> {
        self.store.state(|s| s.by_status(status.as_ref())).await
    }

    /// One order, always read from the backend
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Fetch`] if the backend cannot be reached or refuses.
    pub async fn get_one(&self, id: &OrderId) -> Result<Order, QueryError> {
        self.api.get_order(id).await.map_err(|error| {
            tracing::warn!(order_id = %id, %error, "Could not load order");
            QueryError::Fetch(error.to_string())
        })
    }

    /// Every action the cache applies
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrdersAction> {
        self.store.subscribe_actions()
    }

    /// Stop following the authentication feed, stop accepting actions, then
    /// wait for in-flight fetches
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if fetches outlive `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.listener.0.abort();
        self.store.shutdown(timeout).await
    }
}

/// Feed every identity the authentication service reports into the cache
async fn follow_identity(mut identity: watch::Receiver<Option<UserIdentity>>, store: OrdersStore) {
    loop {
        let user = identity.borrow_and_update().as_ref().map(|user| user.id.clone());
        if let Err(error) = store.send(OrdersAction::AuthChanged { user }).await {
            tracing::debug!(%error, "Order cache closed; no longer following identity");
            return;
        }

        if identity.changed().await.is_err() {
            tracing::debug!("Authentication feed closed");
            return;
        }
    }
}

#[async_trait]
impl PurchaseSink for OrderQueryFacade {
    async fn record_payment(&self, order_id: OrderId, reference: Option<String>) {
        if let Err(error) = self
            .store
            .send(OrdersAction::PaymentConfirmed {
                order_id,
                reference,
            })
            .await
        {
            tracing::warn!(%error, "Could not record payment");
        }
    }
}
