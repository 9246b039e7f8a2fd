//! Waiting for a payment to reach a terminal status.
//!
//! The checkout reducer only sees [`PaymentConfirmation`]; polling is one
//! implementation and a push-based one can replace it without touching the
//! state machine.

use crate::api::{PaymentsApi, VerificationStatus};
use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::types::OrderId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Terminal result of a payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Paid or completed
    Paid {
        /// Gateway reference
        reference: Option<String>,
    },
    /// The gateway reported failure
    Failed,
    /// The payer cancelled
    Cancelled,
}

/// Resolves once the order's payment reaches a terminal status
///
/// The returned future may be dropped at any point; implementations must not
/// do further work after that.
#[async_trait]
pub trait PaymentConfirmation: Send + Sync {
    /// Wait for `paid`/`completed`, `failed` or `cancelled`
    async fn await_terminal_status(&self, order_id: &OrderId) -> PaymentOutcome;
}

/// Queries payment verification on a fixed interval
///
/// The first query goes out one interval after the call. Non-terminal
/// statuses and transport errors keep the loop going.
#[derive(Clone)]
pub struct PollingConfirmation {
    payments: Arc<dyn PaymentsApi>,
    interval: Duration,
}

impl PollingConfirmation {
    /// Poll `payments` every `interval`
    ///
    /// A zero interval is replaced by [`DEFAULT_POLL_INTERVAL_MS`].
    #[must_use]
    pub fn new(payments: Arc<dyn PaymentsApi>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            tracing::warn!("Zero payment poll interval; using the default");
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        } else {
            interval
        };
        Self { payments, interval }
    }
}

#[async_trait]
impl PaymentConfirmation for PollingConfirmation {
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    async fn await_terminal_status(&self, order_id: &OrderId) -> PaymentOutcome {
        let mut ticks = interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempt: u32 = 0;

        loop {
            ticks.tick().await;
            attempt += 1;
            metrics::counter!("checkout.poll.attempts").increment(1);

            let verification = match self.payments.verify(order_id).await {
                Ok(verification) => verification,
                Err(error) => {
                    tracing::warn!(%error, attempt, "Payment verification failed; retrying");
                    continue;
                },
            };

            match verification.classify() {
                VerificationStatus::Paid => {
                    tracing::info!(attempt, "Payment confirmed");
                    return PaymentOutcome::Paid {
                        reference: verification.payment_reference,
                    };
                },
                VerificationStatus::Failed => {
                    tracing::info!(attempt, "Payment failed");
                    return PaymentOutcome::Failed;
                },
                VerificationStatus::Cancelled => {
                    tracing::info!(attempt, "Payment cancelled");
                    return PaymentOutcome::Cancelled;
                },
                VerificationStatus::Pending(status) => {
                    tracing::debug!(attempt, %status, "Payment not settled yet");
                },
            }
        }
    }
}
