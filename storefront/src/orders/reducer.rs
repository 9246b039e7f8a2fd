//! Order cache reducer.

use crate::api::OrdersApi;
use crate::auth::AuthFacade;
use crate::error::QueryError;
use crate::tickets;
use crate::types::{Order, OrderId, OrderStatus, TicketView};
use boxoffice_core::{async_effect, effect::Effect, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Cached orders and the tickets derived from them
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrdersState {
    /// Orders as last returned by the backend, plus optimistic edits
    pub orders: Vec<Order>,
    /// [`tickets::project`] of `orders`
    pub tickets: Vec<TicketView>,
    /// A refresh is in flight
    pub loading: bool,
    /// Last refresh failed
    pub error: Option<QueryError>,
    /// User the cache belongs to
    pub identity: Option<String>,
    /// Whether an auth state has been observed yet
    pub identity_seen: bool,
    /// Bumped by every refresh; results tagged with an older value are stale
    pub generation: u64,
}

impl OrdersState {
    /// Orders with `status`, or all orders for `None`
    #[must_use]
    pub fn by_status(&self, status: Option<&OrderStatus>) -> Vec<Order> {
        match status {
            None => self.orders.clone(),
            Some(status) => self
                .orders
                .iter()
                .filter(|order| &order.status == status)
                .cloned()
                .collect(),
        }
    }

    fn replace(&mut self, orders: Vec<Order>) {
        self.tickets = tickets::project(&orders);
        self.orders = orders;
    }

    fn reset(&mut self) {
        self.orders.clear();
        self.tickets.clear();
    }
}

/// Actions processed by the order cache
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrdersAction {
    /// Re-read every order of the signed-in user
    Refresh,
    /// A refresh returned
    Loaded {
        /// Generation of the refresh
        generation: u64,
        /// Orders as returned
        orders: Vec<Order>,
    },
    /// A refresh failed
    Failed {
        /// Generation of the refresh
        generation: u64,
        /// What went wrong
        message: String,
    },
    /// The authenticated identity may have changed
    AuthChanged {
        /// Signed-in user id
        user: Option<String>,
    },
    /// Checkout confirmed a payment
    PaymentConfirmed {
        /// Paid order
        order_id: OrderId,
        /// Gateway reference
        reference: Option<String>,
    },
}

/// Environment for the order cache
#[derive(Clone)]
pub struct OrdersEnvironment {
    /// Order endpoints
    pub api: Arc<dyn OrdersApi>,
    /// Authentication state
    pub auth: Arc<dyn AuthFacade>,
}

/// Reducer for the order cache
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdersReducer;

impl OrdersReducer {
    fn refresh(state: &mut OrdersState, env: &OrdersEnvironment) -> SmallVec<[Effect<OrdersAction>; 4]> {
        state.generation += 1;

        if !env.auth.is_authenticated() {
            tracing::debug!("Not signed in; clearing orders");
            state.reset();
            state.loading = false;
            state.error = None;
            return SmallVec::new();
        }

        metrics::counter!("orders.refresh.started").increment(1);
        state.loading = true;

        let api = Arc::clone(&env.api);
        let generation = state.generation;
        smallvec![async_effect! {
            match api.list_orders().await {
                Ok(orders) => Some(OrdersAction::Loaded { generation, orders }),
                Err(error) => Some(OrdersAction::Failed {
                    generation,
                    message: error.to_string(),
                }),
            }
        }]
    }
}

impl Reducer for OrdersReducer {
    type State = OrdersState;
    type Action = OrdersAction;
    type Environment = OrdersEnvironment;

    fn reduce(
        &self,
        state: &mut OrdersState,
        action: OrdersAction,
        env: &OrdersEnvironment,
    ) -> SmallVec<[Effect<OrdersAction>; 4]> {
        match action {
            OrdersAction::Refresh => Self::refresh(state, env),

            OrdersAction::Loaded { generation, orders } => {
                if generation != state.generation {
                    tracing::debug!(generation, current = state.generation, "Dropping stale orders");
                    return SmallVec::new();
                }

                metrics::counter!("orders.refresh.succeeded").increment(1);
                tracing::debug!(orders = orders.len(), "Orders loaded");
                state.replace(orders);
                state.loading = false;
                state.error = None;
                SmallVec::new()
            },

            OrdersAction::Failed {
                generation,
                message,
            } => {
                if generation != state.generation {
                    return SmallVec::new();
                }

                metrics::counter!("orders.refresh.failed").increment(1);
                tracing::warn!(%message, "Order refresh failed");
                state.reset();
                state.loading = false;
                state.error = Some(QueryError::Fetch(message));
                SmallVec::new()
            },

            OrdersAction::AuthChanged { user } => {
                if state.identity_seen && state.identity == user {
                    return SmallVec::new();
                }

                tracing::info!(user = ?user, "Identity changed; refreshing orders");
                state.identity_seen = true;
                state.identity = user;
                Self::refresh(state, env)
            },

            OrdersAction::PaymentConfirmed {
                order_id,
                reference,
            } => {
                if let Some(order) = state.orders.iter_mut().find(|order| order.id == order_id) {
                    if order.status.can_transition_to(&OrderStatus::Paid) {
                        order.status = OrderStatus::Paid;
                        if reference.is_some() {
                            order.payment_reference = reference;
                        }
                    }
                }
                let orders = std::mem::take(&mut state.orders);
                state.replace(orders);

                // The backend is authoritative; the refresh replaces the edit.
                Self::refresh(state, env)
            },
        }
    }
}
