//! Checkout session handle.

use super::reducer::{CheckoutAction, CheckoutEnvironment, CheckoutReducer};
use super::state::{CheckoutPhase, CheckoutState};
use crate::cart::{CartAction, CartStore};
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::types::{BillingInfo, PaymentNetwork};
use boxoffice_runtime::{Store, StoreError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// A running purchase attempt
///
/// Created by [`CheckoutSession::start`]; call [`CheckoutSession::teardown`]
/// when the host leaves the checkout view. Dropping the handle without
/// teardown stops the cart bridge but leaves effects running until they end.
pub struct CheckoutSession {
    store: Store<CheckoutState, CheckoutAction, CheckoutEnvironment, CheckoutReducer>,
    cart: CartStore,
    bridge: JoinHandle<()>,
}

impl CheckoutSession {
    /// Open checkout over `cart`
    ///
    /// Waits for the persisted cart, then enters the session. An empty cart
    /// redirects to the cart view straight away.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the cart cannot be loaded.
    pub async fn start(
        config: &CheckoutConfig,
        environment: CheckoutEnvironment,
        cart: CartStore,
    ) -> Result<Self, StoreError> {
        cart.hydrate().await?;

        let store = Store::new(
            CheckoutState::new(config.session_seconds),
            CheckoutReducer,
            environment,
        );

        // Subscribe before reading emptiness so no change is missed.
        let changes = cart.subscribe();
        let bridge = tokio::spawn(bridge_cart(changes, cart.clone(), store.clone()));

        let cart_empty = cart.is_empty().await;
        store.send(CheckoutAction::Enter { cart_empty }).await?;

        Ok(Self {
            store,
            cart,
            bridge,
        })
    }

    /// Replace the billing form
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after teardown.
    pub async fn update_billing(&self, billing: BillingInfo) -> Result<(), StoreError> {
        self.store.send(CheckoutAction::UpdateBilling { billing }).await
    }

    /// Pick the payment network
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after teardown.
    pub async fn select_network(&self, network: PaymentNetwork) -> Result<(), StoreError> {
        self.store.send(CheckoutAction::SelectNetwork { network }).await
    }

    /// Submit the form with the cart's current contents
    ///
    /// Validation failures land in [`CheckoutSession::error`]; nothing is sent
    /// to the backend in that case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after teardown.
    pub async fn submit(&self) -> Result<(), StoreError> {
        let items = self.cart.order_lines().await;
        self.store.send(CheckoutAction::Submit { items }).await
    }

    /// Leave checkout for the cart; safe in any phase
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after teardown.
    pub async fn cancel(&self) -> Result<(), StoreError> {
        self.store.send(CheckoutAction::Cancel).await
    }

    /// Stop timers and in-flight calls and discard the session
    ///
    /// Results that arrive afterwards are dropped. Calling it twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects outlive `timeout`.
    pub async fn teardown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.bridge.abort();
        if let Err(error) = self.store.send(CheckoutAction::Teardown).await {
            tracing::debug!(%error, "Checkout session already torn down");
        }
        self.store.shutdown(timeout).await
    }

    /// Copy of the session state
    pub async fn snapshot(&self) -> CheckoutState {
        self.store.state(Clone::clone).await
    }

    /// Current phase
    pub async fn phase(&self) -> CheckoutPhase {
        self.store.state(|s| s.phase).await
    }

    /// Error shown to the buyer, if any
    pub async fn error(&self) -> Option<CheckoutError> {
        self.store.state(|s| s.error.clone()).await
    }

    /// Countdown as `mm:ss`
    pub async fn remaining_display(&self) -> String {
        self.store.state(CheckoutState::remaining_display).await
    }

    /// Whether the session still accepts actions
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.store.is_live()
    }

    /// Every action the session applies
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutAction> {
        self.store.subscribe_actions()
    }
}

impl Drop for CheckoutSession {
    fn drop(&mut self) {
        self.bridge.abort();
    }
}

/// Forward cart emptiness into the session until either side goes away
async fn bridge_cart(
    mut changes: broadcast::Receiver<CartAction>,
    cart: CartStore,
    session: Store<CheckoutState, CheckoutAction, CheckoutEnvironment, CheckoutReducer>,
) {
    loop {
        match changes.recv().await {
            Ok(_) => {},
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Cart bridge lagged");
            },
            Err(RecvError::Closed) => return,
        }

        let is_empty = cart.is_empty().await;
        if session.send(CheckoutAction::CartChanged { is_empty }).await.is_err() {
            return;
        }
    }
}
