//! Checkout state machine.
//!
//! Three flows feed this reducer: the countdown (`Tick`), one-shot backend
//! calls (order creation, payment initialization) and the confirmation task.
//! Each runs under its own [`EffectId`] so any state transition can stop the
//! others. Every handler checks the phase it expects; a result that arrives
//! for a phase the session already left is dropped.

use super::confirmation::{PaymentConfirmation, PaymentOutcome, PollingConfirmation};
use super::state::{CheckoutPhase, CheckoutState};
use super::PurchaseSink;
use crate::api::{
    CreateOrderRequest, OrdersApi, PaymentInitOutcome, PaymentInitRequest, PaymentsApi,
};
use crate::cart::CartHandle;
use crate::config::{CheckoutConfig, DEFAULT_TICK_MS};
use crate::error::CheckoutError;
use crate::navigation::{Navigator, Route};
use crate::types::{BillingInfo, OrderId, OrderLine, PaymentNetwork};
use boxoffice_core::{
    async_effect, delay,
    effect::{Effect, EffectId},
    reducer::Reducer,
    smallvec, SmallVec,
};
use std::sync::Arc;
use std::time::Duration;

/// Countdown ticks
pub const SESSION_TIMER: EffectId = EffectId::new("checkout.session_timer");
/// Order creation and payment initialization calls
pub const SUBMISSION: EffectId = EffectId::new("checkout.submission");
/// The confirmation task
pub const PAYMENT_WATCH: EffectId = EffectId::new("checkout.payment_watch");

const GENERIC_ORDER_FAILURE: &str = "We could not create your order. Please try again.";
const GENERIC_INIT_FAILURE: &str = "Could not initiate payment. Please try again.";

/// Actions processed by a checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutAction {
    /// The buyer opened checkout
    Enter {
        /// Whether the cart was empty at that moment
        cart_empty: bool,
    },
    /// Billing form edited
    UpdateBilling {
        /// New form contents
        billing: BillingInfo,
    },
    /// Payment network picked
    SelectNetwork {
        /// Selected network
        network: PaymentNetwork,
    },
    /// The buyer pressed pay
    Submit {
        /// Cart flattened for order creation
        items: Vec<OrderLine>,
    },
    /// The backend created the order
    OrderCreated {
        /// New order id
        order_id: OrderId,
    },
    /// The backend refused the order
    OrderRejected {
        /// Backend explanation, shown verbatim when present
        message: Option<String>,
    },
    /// Payment initialization answered
    PaymentInitialized {
        /// Classified response
        outcome: PaymentInitOutcome,
    },
    /// Payment initialization failed
    PaymentInitFailed {
        /// Backend explanation; logged only
        message: Option<String>,
    },
    /// The payment reached a terminal status
    PaymentSettled {
        /// Terminal status
        outcome: PaymentOutcome,
    },
    /// One countdown step elapsed
    Tick,
    /// The cart changed while the session was open
    CartChanged {
        /// Whether the cart is now empty
        is_empty: bool,
    },
    /// The buyer went back to the cart
    Cancel,
    /// The host is discarding the session
    Teardown,
}

/// Dependencies of a checkout session
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Order creation
    pub orders: Arc<dyn OrdersApi>,
    /// Payment initialization
    pub payments: Arc<dyn PaymentsApi>,
    /// Waits for the terminal payment status
    pub confirmation: Arc<dyn PaymentConfirmation>,
    /// Host router
    pub navigator: Arc<dyn Navigator>,
    /// Cart the session buys from
    pub cart: Arc<dyn CartHandle>,
    /// Receives confirmed purchases
    pub purchases: Arc<dyn PurchaseSink>,
    /// Length of one countdown step
    pub tick: Duration,
}

impl CheckoutEnvironment {
    /// Environment that confirms payments by polling `payments`
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrdersApi>,
        payments: Arc<dyn PaymentsApi>,
        navigator: Arc<dyn Navigator>,
        cart: Arc<dyn CartHandle>,
        purchases: Arc<dyn PurchaseSink>,
        config: &CheckoutConfig,
    ) -> Self {
        let confirmation = Arc::new(PollingConfirmation::new(
            Arc::clone(&payments),
            config.poll_interval(),
        ));

        Self {
            orders,
            payments,
            confirmation,
            navigator,
            cart,
            purchases,
            tick: config.tick(),
        }
    }

    /// Replace the confirmation mechanism
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: Arc<dyn PaymentConfirmation>) -> Self {
        self.confirmation = confirmation;
        self
    }
}

type Effects = SmallVec<[Effect<CheckoutAction>; 4]>;

/// Reducer for a checkout session
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    fn schedule_tick(env: &CheckoutEnvironment) -> Effect<CheckoutAction> {
        let period = if env.tick.is_zero() {
            Duration::from_millis(DEFAULT_TICK_MS)
        } else {
            env.tick
        };
        let tick = delay! {
            duration: period,
            action: CheckoutAction::Tick
        };
        tick.cancellable(SESSION_TIMER)
    }

    fn navigate(env: &CheckoutEnvironment, route: Route) -> Effect<CheckoutAction> {
        let navigator = Arc::clone(&env.navigator);
        async_effect! {
            tracing::debug!(%route, "Navigation requested");
            navigator.redirect(route);
            None
        }
    }

    /// Redirect to the cart unless this session already did
    fn redirect_to_cart(state: &mut CheckoutState, env: &CheckoutEnvironment, effects: &mut Effects) {
        if state.redirected {
            return;
        }
        state.redirected = true;
        effects.push(Self::navigate(env, Route::Cart));
    }

    fn stop_everything(state: &mut CheckoutState) -> Effects {
        state.timer_running = false;
        smallvec![
            Effect::Cancel(SESSION_TIMER),
            Effect::Cancel(SUBMISSION),
            Effect::Cancel(PAYMENT_WATCH),
        ]
    }

    fn fail(state: &mut CheckoutState, error: CheckoutError) -> Effects {
        tracing::info!(from = %state.phase, %error, "Checkout failed");
        metrics::counter!("checkout.sessions.failed").increment(1);
        state.phase = CheckoutPhase::Failed;
        state.error = Some(error);
        SmallVec::new()
    }

    fn create_order(env: &CheckoutEnvironment, request: CreateOrderRequest) -> Effect<CheckoutAction> {
        let orders = Arc::clone(&env.orders);
        let call = async_effect! {
            match orders.create_order(request).await {
                Ok(created) => Some(CheckoutAction::OrderCreated {
                    order_id: created.order_id,
                }),
                Err(error) => {
                    tracing::warn!(%error, "Order creation failed");
                    Some(CheckoutAction::OrderRejected {
                        message: error.backend_message(),
                    })
                },
            }
        };
        call.cancellable(SUBMISSION)
    }

    fn initialize_payment(
        env: &CheckoutEnvironment,
        order_id: OrderId,
        request: PaymentInitRequest,
    ) -> Effect<CheckoutAction> {
        let payments = Arc::clone(&env.payments);
        let call = async_effect! {
            match payments.initialize(&order_id, request).await {
                Ok(response) => Some(CheckoutAction::PaymentInitialized {
                    outcome: response.outcome(),
                }),
                Err(error) => Some(CheckoutAction::PaymentInitFailed {
                    message: Some(error.to_string()),
                }),
            }
        };
        call.cancellable(SUBMISSION)
    }

    fn await_confirmation(env: &CheckoutEnvironment, order_id: OrderId) -> Effect<CheckoutAction> {
        let confirmation = Arc::clone(&env.confirmation);
        let watch = async_effect! {
            let outcome = confirmation.await_terminal_status(&order_id).await;
            Some(CheckoutAction::PaymentSettled { outcome })
        };
        watch.cancellable(PAYMENT_WATCH)
    }

    /// Clear the cart, then hand the purchase to the sink
    fn finish_purchase(
        env: &CheckoutEnvironment,
        order_id: OrderId,
        reference: Option<String>,
    ) -> Effect<CheckoutAction> {
        let cart = Arc::clone(&env.cart);
        let purchases = Arc::clone(&env.purchases);
        async_effect! {
            cart.clear().await;
            purchases.record_payment(order_id, reference).await;
            None
        }
    }
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut CheckoutState,
        action: CheckoutAction,
        env: &CheckoutEnvironment,
    ) -> Effects {
        if !state.live {
            tracing::trace!(?action, "Ignoring action for a torn-down session");
            return SmallVec::new();
        }

        match action {
            CheckoutAction::Enter { cart_empty } => {
                // A paid session never redirects on an empty cart again; the
                // cart is cleared as part of completing the purchase.
                if state.payment_complete || state.phase != CheckoutPhase::Idle {
                    return SmallVec::new();
                }

                let mut effects = Effects::new();
                if cart_empty {
                    tracing::info!("Checkout entered with an empty cart");
                    state.phase = CheckoutPhase::Abandoned;
                    Self::redirect_to_cart(state, env, &mut effects);
                    return effects;
                }

                metrics::counter!("checkout.sessions.started").increment(1);
                tracing::info!(seconds = state.remaining_seconds, "Checkout session started");
                state.phase = CheckoutPhase::AwaitingSubmission;
                state.timer_running = true;
                effects.push(Self::schedule_tick(env));
                effects
            },

            CheckoutAction::UpdateBilling { billing } => {
                if state.phase.accepts_submission() {
                    state.billing = billing;
                }
                SmallVec::new()
            },

            CheckoutAction::SelectNetwork { network } => {
                if state.phase.accepts_submission() {
                    state.network = network;
                }
                SmallVec::new()
            },

            CheckoutAction::Submit { items } => {
                if !state.phase.accepts_submission() {
                    tracing::debug!(phase = %state.phase, "Submit ignored");
                    return SmallVec::new();
                }

                let missing = state.billing.missing_fields(state.network);
                if !missing.is_empty() {
                    state.error = Some(CheckoutError::Validation(format!(
                        "Please fill in: {}",
                        missing.join(", ")
                    )));
                    return SmallVec::new();
                }
                if items.is_empty() {
                    state.error = Some(CheckoutError::Validation(
                        "Your cart has no tickets to order".to_string(),
                    ));
                    return SmallVec::new();
                }

                tracing::info!(items = items.len(), network = %state.network, "Creating order");
                state.phase = CheckoutPhase::Creating;
                state.error = None;
                state.order_id = None;

                let request = CreateOrderRequest {
                    items,
                    billing: state.billing.clone(),
                };
                smallvec![Self::create_order(env, request)]
            },

            CheckoutAction::OrderCreated { order_id } => {
                if state.phase != CheckoutPhase::Creating {
                    return SmallVec::new();
                }

                tracing::info!(%order_id, "Order created; initializing payment");
                state.phase = CheckoutPhase::Initializing;
                state.order_id = Some(order_id.clone());

                let request = PaymentInitRequest {
                    direct_charge: state.network.is_mobile_money(),
                    network: state.network,
                    phone: state.billing.phone.trim().to_string(),
                };
                smallvec![Self::initialize_payment(env, order_id, request)]
            },

            CheckoutAction::OrderRejected { message } => {
                if state.phase != CheckoutPhase::Creating {
                    return SmallVec::new();
                }

                let message = message.unwrap_or_else(|| GENERIC_ORDER_FAILURE.to_string());
                Self::fail(state, CheckoutError::OrderCreation(message))
            },

            CheckoutAction::PaymentInitialized { outcome } => {
                if state.phase != CheckoutPhase::Initializing {
                    return SmallVec::new();
                }

                match (outcome, state.order_id.clone()) {
                    (PaymentInitOutcome::Redirect { checkout_url }, _) => {
                        tracing::info!("Handing off to hosted payment page");
                        state.phase = CheckoutPhase::RedirectingExternal;
                        state.timer_running = false;
                        state.redirected = true;
                        smallvec![
                            Effect::Cancel(SESSION_TIMER),
                            Self::navigate(env, Route::External(checkout_url)),
                        ]
                    },
                    (PaymentInitOutcome::Direct { .. }, Some(order_id)) => {
                        tracing::info!(%order_id, "Waiting for payment confirmation");
                        state.phase = CheckoutPhase::Polling;
                        smallvec![Self::await_confirmation(env, order_id)]
                    },
                    (PaymentInitOutcome::Direct { .. } | PaymentInitOutcome::Unrecognized, _) => {
                        Self::fail(state, CheckoutError::PaymentInit(GENERIC_INIT_FAILURE.to_string()))
                    },
                }
            },

            CheckoutAction::PaymentInitFailed { message } => {
                if state.phase != CheckoutPhase::Initializing {
                    return SmallVec::new();
                }

                tracing::warn!(?message, "Payment initialization failed");
                Self::fail(state, CheckoutError::PaymentInit(GENERIC_INIT_FAILURE.to_string()))
            },

            CheckoutAction::PaymentSettled { outcome } => {
                if state.phase != CheckoutPhase::Polling {
                    return SmallVec::new();
                }

                match outcome {
                    PaymentOutcome::Paid { reference } => {
                        let Some(order_id) = state.order_id.clone() else {
                            return Self::fail(
                                state,
                                CheckoutError::PaymentFailed("Payment could not be matched to an order".to_string()),
                            );
                        };

                        metrics::counter!("checkout.sessions.succeeded").increment(1);
                        tracing::info!(%order_id, ?reference, "Payment succeeded");
                        state.phase = CheckoutPhase::Succeeded;
                        state.payment_complete = true;
                        state.timer_running = false;
                        state.payment_reference.clone_from(&reference);
                        state.error = None;

                        smallvec![
                            Effect::Cancel(SESSION_TIMER),
                            Self::finish_purchase(env, order_id, reference),
                        ]
                    },
                    PaymentOutcome::Failed => Self::fail(
                        state,
                        CheckoutError::PaymentFailed("Payment failed. Please try again.".to_string()),
                    ),
                    PaymentOutcome::Cancelled => Self::fail(
                        state,
                        CheckoutError::PaymentFailed("Payment was cancelled.".to_string()),
                    ),
                }
            },

            CheckoutAction::Tick => {
                if !state.timer_running {
                    return SmallVec::new();
                }

                state.remaining_seconds = state.remaining_seconds.saturating_sub(1);
                if state.remaining_seconds > 0 {
                    return smallvec![Self::schedule_tick(env)];
                }

                metrics::counter!("checkout.sessions.expired").increment(1);
                tracing::info!(phase = %state.phase, "Checkout session expired");
                state.phase = CheckoutPhase::Expired;
                state.error = Some(CheckoutError::SessionExpired);

                let mut effects = Self::stop_everything(state);
                Self::redirect_to_cart(state, env, &mut effects);
                effects
            },

            CheckoutAction::CartChanged { is_empty } => {
                // Same rule as `Enter`: once paid, emptying is expected.
                if !is_empty
                    || state.payment_complete
                    || state.phase == CheckoutPhase::Idle
                    || state.phase.is_final()
                {
                    return SmallVec::new();
                }

                metrics::counter!("checkout.sessions.abandoned").increment(1);
                tracing::info!(phase = %state.phase, "Cart emptied during checkout");
                state.phase = CheckoutPhase::Abandoned;

                let mut effects = Self::stop_everything(state);
                Self::redirect_to_cart(state, env, &mut effects);
                effects
            },

            CheckoutAction::Cancel => {
                if !state.phase.is_final() {
                    metrics::counter!("checkout.sessions.abandoned").increment(1);
                    tracing::info!(phase = %state.phase, "Checkout abandoned");
                    state.phase = CheckoutPhase::Abandoned;
                }

                let mut effects = Self::stop_everything(state);
                Self::redirect_to_cart(state, env, &mut effects);
                effects
            },

            CheckoutAction::Teardown => {
                tracing::debug!(phase = %state.phase, "Checkout session torn down");
                state.live = false;
                Self::stop_everything(state)
            },
        }
    }
}
