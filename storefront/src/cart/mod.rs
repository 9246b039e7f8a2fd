//! Cart store.
//!
//! The cart lives in a runtime [`Store`] driven by [`CartReducer`]. Consumers
//! receive a [`CartStore`] handle by construction; there is no global cart.
//!
//! Persistence ordering: the stored cart is read once by [`CartStore::hydrate`].
//! Until that read completes, mutations stay in memory and never touch storage,
//! so an early empty cart cannot overwrite a saved one.

mod reducer;

pub use reducer::{
    decode_lines, CartAction, CartEnvironment, CartPersistence, CartReducer, CartState,
    CART_STORAGE_KEY,
};

use crate::storage::ClientStorage;
use crate::types::{CartLine, CartLineId, EventSnapshot, Money, OrderLine};
use async_trait::async_trait;
use boxoffice_core::environment::Clock;
use boxoffice_runtime::{Store, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How long [`CartStore::hydrate`] waits for storage
const HYDRATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the cart
///
/// Cheap to clone; all clones share one cart.
#[derive(Clone)]
pub struct CartStore {
    store: Store<CartState, CartAction, CartEnvironment, CartReducer>,
}

impl CartStore {
    /// A cart backed by `storage`; call [`CartStore::hydrate`] before use
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Store::new(
                CartState::default(),
                CartReducer,
                CartEnvironment::new(storage, clock),
            ),
        }
    }

    /// Start reading the persisted cart without waiting for it
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`CartStore::shutdown`].
    pub async fn begin_hydrate(&self) -> Result<(), StoreError> {
        self.store.send(CartAction::Hydrate).await
    }

    /// Read the persisted cart and wait until it is applied
    ///
    /// Returns immediately when the cart is already loaded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if storage does not answer in time.
    pub async fn hydrate(&self) -> Result<(), StoreError> {
        if self.is_loaded().await {
            return Ok(());
        }

        self.store
            .send_and_wait_for(
                CartAction::Hydrate,
                |action| matches!(action, CartAction::Hydrated { .. }),
                HYDRATE_TIMEOUT,
            )
            .await
            .map(|_| ())
    }

    /// Add a new line for `event`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`CartStore::shutdown`].
    pub async fn add_line(
        &self,
        event: EventSnapshot,
        tickets: BTreeMap<String, u32>,
    ) -> Result<(), StoreError> {
        self.store.send(CartAction::AddLine { event, tickets }).await
    }

    /// Remove a line; no-op if absent
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`CartStore::shutdown`].
    pub async fn remove_line(&self, id: CartLineId) -> Result<(), StoreError> {
        self.store.send(CartAction::RemoveLine { id }).await
    }

    /// Set a ticket quantity; `<= 0` removes the ticket, and the line if it
    /// becomes empty
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`CartStore::shutdown`].
    pub async fn set_quantity(
        &self,
        line_id: CartLineId,
        ticket_name: impl Into<String>,
        quantity: i64,
    ) -> Result<(), StoreError> {
        self.store
            .send(CartAction::SetQuantity {
                line_id,
                ticket_name: ticket_name.into(),
                quantity,
            })
            .await
    }

    /// Empty the cart and erase the persisted blob
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`CartStore::shutdown`].
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.send(CartAction::Clear).await
    }

    /// Current lines
    pub async fn lines(&self) -> Vec<CartLine> {
        self.store.state(|s| s.lines.clone()).await
    }

    /// Sum of all quantities
    pub async fn count(&self) -> u64 {
        self.store.state(CartState::count).await
    }

    /// Cart total, priced from the line snapshots
    pub async fn total(&self) -> Money {
        self.store.state(CartState::total).await
    }

    /// Whether the cart has no lines
    pub async fn is_empty(&self) -> bool {
        self.store.state(CartState::is_empty).await
    }

    /// Cart flattened to `{ticket_type_id, quantity}` pairs
    pub async fn order_lines(&self) -> Vec<OrderLine> {
        self.store.state(CartState::order_lines).await
    }

    /// Whether the persisted cart has been read
    pub async fn is_loaded(&self) -> bool {
        self.store.state(|s| s.loaded).await
    }

    /// Every action the cart applies, after it is applied
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartAction> {
        self.store.subscribe_actions()
    }

    /// Wait for pending storage writes
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if writes are still running after `timeout`.
    pub async fn flush(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.settle(timeout).await
    }

    /// Flush pending writes and stop accepting actions
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if writes are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        // Persistence effects are not cancellable, so let them land first.
        if let Err(error) = self.store.settle(timeout).await {
            tracing::warn!(%error, "Cart writes still pending at shutdown");
        }
        self.store.shutdown(timeout).await
    }
}

/// The slice of the cart a checkout session needs
#[async_trait]
pub trait CartHandle: Send + Sync {
    /// Cart flattened for order creation
    async fn order_lines(&self) -> Vec<OrderLine>;

    /// Whether the cart has no lines
    async fn is_empty(&self) -> bool;

    /// Empty the cart after a successful payment
    async fn clear(&self);
}

#[async_trait]
impl CartHandle for CartStore {
    async fn order_lines(&self) -> Vec<OrderLine> {
        CartStore::order_lines(self).await
    }

    async fn is_empty(&self) -> bool {
        CartStore::is_empty(self).await
    }

    async fn clear(&self) {
        if let Err(error) = CartStore::clear(self).await {
            tracing::warn!(%error, "Could not clear cart");
        }
    }
}
