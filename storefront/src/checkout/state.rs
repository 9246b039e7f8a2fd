//! Checkout session state.

use crate::error::CheckoutError;
use crate::types::{BillingInfo, OrderId, PaymentNetwork};
use std::fmt;

/// Where a checkout session is in its lifecycle
///
/// ```text
/// Idle → AwaitingSubmission → Creating → Initializing → RedirectingExternal
///                   ↑                                 ↘ Polling → Succeeded
///                   └──────────── Failed ←────────────────┘
/// ```
///
/// `Expired` and `Abandoned` can be entered from any phase before `Succeeded`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CheckoutPhase {
    /// Not entered yet
    #[default]
    Idle,
    /// The buyer is filling in the billing form
    AwaitingSubmission,
    /// Order creation is in flight
    Creating,
    /// Payment initialization is in flight
    Initializing,
    /// Handed off to the gateway's hosted page; the session ends here
    RedirectingExternal,
    /// Waiting for the direct charge to settle
    Polling,
    /// Payment confirmed
    Succeeded,
    /// Order creation, initialization or payment failed; can be resubmitted
    Failed,
    /// The countdown reached zero
    Expired,
    /// The buyer left, or the cart was empty
    Abandoned,
}

impl CheckoutPhase {
    /// Whether a `Submit` is accepted in this phase
    #[must_use]
    pub const fn accepts_submission(self) -> bool {
        matches!(self, Self::AwaitingSubmission | Self::Failed)
    }

    /// Whether the session is over; nothing but teardown changes it anymore
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::RedirectingExternal | Self::Succeeded | Self::Expired | Self::Abandoned
        )
    }

    /// Whether backend work is in flight
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Creating | Self::Initializing | Self::Polling)
    }

    /// Name used in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingSubmission => "awaiting_submission",
            Self::Creating => "creating",
            Self::Initializing => "initializing",
            Self::RedirectingExternal => "redirecting_external",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutState {
    /// Lifecycle phase
    pub phase: CheckoutPhase,
    /// Billing form
    pub billing: BillingInfo,
    /// Selected payment network
    pub network: PaymentNetwork,
    /// Seconds left on the countdown
    pub remaining_seconds: u32,
    /// Whether the countdown is scheduled
    pub timer_running: bool,
    /// Set once payment succeeded; suppresses the empty-cart redirect
    pub payment_complete: bool,
    /// Order created for this session
    pub order_id: Option<OrderId>,
    /// Gateway reference of the successful payment
    pub payment_reference: Option<String>,
    /// Last error shown to the buyer
    pub error: Option<CheckoutError>,
    /// Whether the cart redirect has been issued
    pub redirected: bool,
    /// Cleared on teardown; a torn-down session ignores every action
    pub live: bool,
}

impl CheckoutState {
    /// A fresh session with a countdown of `session_seconds`
    #[must_use]
    pub fn new(session_seconds: u32) -> Self {
        Self {
            phase: CheckoutPhase::Idle,
            billing: BillingInfo::default(),
            network: PaymentNetwork::default(),
            remaining_seconds: session_seconds,
            timer_running: false,
            payment_complete: false,
            order_id: None,
            payment_reference: None,
            error: None,
            redirected: false,
            live: true,
        }
    }

    /// Countdown as `mm:ss`
    #[must_use]
    pub fn remaining_display(&self) -> String {
        format!("{:02}:{:02}", self.remaining_seconds / 60, self.remaining_seconds % 60)
    }
}

impl Default for CheckoutState {
    fn default() -> Self {
        Self::new(1800)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_display() {
        let mut state = CheckoutState::default();
        assert_eq!(state.remaining_display(), "30:00");

        state.remaining_seconds = 61;
        assert_eq!(state.remaining_display(), "01:01");

        state.remaining_seconds = 0;
        assert_eq!(state.remaining_display(), "00:00");
    }

    #[test]
    fn test_phase_predicates() {
        assert!(CheckoutPhase::Failed.accepts_submission());
        assert!(!CheckoutPhase::Polling.accepts_submission());
        assert!(CheckoutPhase::Succeeded.is_final());
        assert!(!CheckoutPhase::Failed.is_final());
        assert!(CheckoutPhase::Creating.is_busy());
    }
}
