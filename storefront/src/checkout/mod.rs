//! Checkout session.
//!
//! One [`CheckoutSession`] drives one purchase attempt: billing form,
//! countdown, order creation, payment initialization and confirmation. The
//! state machine lives in [`CheckoutReducer`]; confirmation sits behind
//! [`PaymentConfirmation`] so polling can be swapped for push.

mod confirmation;
mod reducer;
mod session;
mod state;

pub use confirmation::{PaymentConfirmation, PaymentOutcome, PollingConfirmation};
pub use reducer::{
    CheckoutAction, CheckoutEnvironment, CheckoutReducer, PAYMENT_WATCH, SESSION_TIMER, SUBMISSION,
};
pub use session::CheckoutSession;
pub use state::{CheckoutPhase, CheckoutState};

use crate::types::OrderId;
use async_trait::async_trait;

/// Receives orders paid through checkout
///
/// The order query facade implements this to show the purchase right away.
#[async_trait]
pub trait PurchaseSink: Send + Sync {
    /// `order_id` was paid with gateway `reference`
    async fn record_payment(&self, order_id: OrderId, reference: Option<String>);
}
