//! Backend collaborators: order creation and listing, payment initialization
//! and verification.
//!
//! The storefront owns no wire format. Request types serialize to the shapes
//! the backend expects; responses are read leniently, and
//! [`http::HttpBackend`] strips `{ "data": … }` envelopes before anything here
//! sees them.

pub mod http;

use crate::error::ApiError;
use crate::types::{lenient, BillingInfo, Order, OrderId, OrderLine, PaymentNetwork};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::auth::AuthFacade;
pub use http::HttpBackend;

/// Order endpoints
#[async_trait]
pub trait OrdersApi: Send + Sync {
    /// `POST /orders`: create a pending order for the given items
    ///
    /// # Errors
    ///
    /// [`ApiError::Rejected`] carries the backend's explanation when it refuses
    /// the order (for example, sold-out inventory).
    async fn create_order(&self, request: CreateOrderRequest) -> Result<CreatedOrder, ApiError>;

    /// `GET /orders`: every order of the signed-in user
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success response.
    async fn list_orders(&self) -> Result<Vec<Order>, ApiError>;

    /// `GET /orders/{id}`: one order with detail fields
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success response.
    async fn get_order(&self, id: &OrderId) -> Result<Order, ApiError>;
}

/// Payment endpoints
#[async_trait]
pub trait PaymentsApi: Send + Sync {
    /// `POST /payments/initialize`: start a charge for an order
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success response.
    async fn initialize(
        &self,
        order_id: &OrderId,
        request: PaymentInitRequest,
    ) -> Result<PaymentInitResponse, ApiError>;

    /// `GET /payments/verify/{order_id}`: current payment status
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success response.
    async fn verify(&self, order_id: &OrderId) -> Result<PaymentVerification, ApiError>;
}

// ============================================================================
// Order creation
// ============================================================================

/// Body of `POST /orders`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    /// Flattened cart
    pub items: Vec<OrderLine>,
    /// Buyer details
    #[serde(flatten)]
    pub billing: BillingInfo,
}

/// A successfully created order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedOrder {
    /// Id to initialize payment for
    pub order_id: OrderId,
}

impl CreatedOrder {
    /// Reads a `{success, orderId, …}` response
    ///
    /// The id may sit under `order_id`, `orderId`, `order.id` or `id`.
    ///
    /// # Errors
    ///
    /// A body with `success: false` or no order id is a rejection; the
    /// backend's message, if any, is kept.
    pub fn from_response(status: u16, body: &Value) -> Result<Self, ApiError> {
        let success = body.get("success").and_then(Value::as_bool).unwrap_or(true);
        let order_id = ["order_id", "orderId"]
            .iter()
            .find_map(|key| body.get(*key))
            .or_else(|| body.get("order").and_then(|order| order.get("id")))
            .or_else(|| body.get("id"))
            .and_then(scalar_text)
            .map(OrderId::new);

        match order_id {
            Some(order_id) if success => Ok(Self { order_id }),
            _ => {
                let (message, errors) = error_details(body);
                Err(ApiError::Rejected {
                    status,
                    message,
                    errors,
                })
            },
        }
    }
}

// ============================================================================
// Payment initialization
// ============================================================================

/// Body of `POST /payments/initialize` (the order id is added by the adapter)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentInitRequest {
    /// Charge the phone wallet directly instead of redirecting
    pub direct_charge: bool,
    /// Selected network
    pub network: PaymentNetwork,
    /// Wallet phone number
    pub phone: String,
}

/// Response of `POST /payments/initialize`
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaymentInitResponse {
    /// Hosted payment page
    #[serde(alias = "checkoutUrl", alias = "authorization_url", deserialize_with = "lenient::opt_string")]
    pub checkout_url: Option<String>,
    /// `"direct"` when the gateway charges the wallet itself
    #[serde(deserialize_with = "lenient::opt_string")]
    pub mode: Option<String>,
    /// Token of a direct charge
    #[serde(alias = "payToken", deserialize_with = "lenient::opt_string")]
    pub pay_token: Option<String>,
}

/// What the checkout session does after initialization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentInitOutcome {
    /// Send the user to the gateway's page
    Redirect {
        /// Hosted payment page
        checkout_url: String,
    },
    /// Wait for the wallet charge to settle
    Direct {
        /// Token of the charge, when the gateway returned one
        pay_token: Option<String>,
    },
    /// Neither shape; the handshake failed
    Unrecognized,
}

impl PaymentInitResponse {
    /// Classify the response; a checkout URL wins over a direct charge
    #[must_use]
    pub fn outcome(self) -> PaymentInitOutcome {
        if let Some(checkout_url) = self.checkout_url {
            return PaymentInitOutcome::Redirect { checkout_url };
        }

        let direct = self
            .mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("direct"));
        if direct || self.pay_token.is_some() {
            return PaymentInitOutcome::Direct {
                pay_token: self.pay_token,
            };
        }

        PaymentInitOutcome::Unrecognized
    }
}

// ============================================================================
// Payment verification
// ============================================================================

/// Response of `GET /payments/verify/{order_id}`
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaymentVerification {
    /// Raw gateway status
    #[serde(deserialize_with = "lenient::string")]
    pub status: String,
    /// Gateway reference
    #[serde(alias = "paymentReference", alias = "reference", deserialize_with = "lenient::opt_string")]
    pub payment_reference: Option<String>,
    /// Order the status belongs to
    #[serde(alias = "orderId")]
    pub order_id: OrderId,
}

/// Classified verification status
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationStatus {
    /// `paid` or `completed`
    Paid,
    /// `failed`
    Failed,
    /// `cancelled`
    Cancelled,
    /// Anything else, including transient and unknown values
    Pending(String),
}

impl PaymentVerification {
    /// Classify the raw status, case-insensitively
    #[must_use]
    pub fn classify(&self) -> VerificationStatus {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "paid" | "completed" => VerificationStatus::Paid,
            "failed" => VerificationStatus::Failed,
            "cancelled" | "canceled" => VerificationStatus::Cancelled,
            other => VerificationStatus::Pending(other.to_string()),
        }
    }
}

// ============================================================================
// Response helpers
// ============================================================================

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Message and field errors from an error body
///
/// Understands `{message}`, `{error}`, `{error: {message}}` and `errors` given
/// either as a list or as a field → message(s) map.
pub(crate) fn error_details(body: &Value) -> (Option<String>, Vec<String>) {
    let message = body
        .get("message")
        .and_then(scalar_text)
        .or_else(|| body.get("error").and_then(scalar_text))
        .or_else(|| {
            body.get("error")
                .and_then(|error| error.get("message"))
                .and_then(scalar_text)
        });

    let errors = match body.get("errors") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::Object(fields)) => fields
            .iter()
            .flat_map(|(field, detail)| {
                let details: Vec<String> = match detail {
                    Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
                    other => scalar_text(other).into_iter().collect(),
                };
                details
                    .into_iter()
                    .map(move |detail| format!("{field}: {detail}"))
            })
            .collect(),
        _ => Vec::new(),
    };

    (message, errors)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_created_order_id_locations() {
        for body in [
            json!({"success": true, "orderId": 12}),
            json!({"order_id": "12"}),
            json!({"order": {"id": 12}}),
            json!({"id": "12", "status": "pending"}),
        ] {
            assert_eq!(
                CreatedOrder::from_response(201, &body).unwrap().order_id,
                OrderId::new("12")
            );
        }
    }

    #[test]
    fn test_created_order_failure_keeps_message() {
        let body = json!({"success": false, "message": "Sold out"});

        let error = CreatedOrder::from_response(200, &body).unwrap_err();
        assert_eq!(error.backend_message().as_deref(), Some("Sold out"));
    }

    #[test]
    fn test_error_details_from_field_map() {
        let body = json!({"errors": {"email": ["is invalid"], "phone": "is required"}});

        let (message, errors) = error_details(&body);
        assert_eq!(message, None);
        assert_eq!(errors, vec!["email: is invalid", "phone: is required"]);
    }

    #[test]
    fn test_init_outcome_shapes() {
        let redirect: PaymentInitResponse =
            serde_json::from_value(json!({"checkout_url": "https://pay.example/abc", "mode": "direct"})).unwrap();
        assert_eq!(
            redirect.outcome(),
            PaymentInitOutcome::Redirect {
                checkout_url: "https://pay.example/abc".to_string()
            }
        );

        let direct: PaymentInitResponse = serde_json::from_value(json!({"mode": "DIRECT"})).unwrap();
        assert_eq!(direct.outcome(), PaymentInitOutcome::Direct { pay_token: None });

        let token: PaymentInitResponse = serde_json::from_value(json!({"payToken": "tok"})).unwrap();
        assert_eq!(
            token.outcome(),
            PaymentInitOutcome::Direct {
                pay_token: Some("tok".to_string())
            }
        );

        let neither: PaymentInitResponse =
            serde_json::from_value(json!({"checkout_url": "", "mode": "redirect"})).unwrap();
        assert_eq!(neither.outcome(), PaymentInitOutcome::Unrecognized);
    }

    #[test]
    fn test_verification_classification() {
        let status = |raw: &str| PaymentVerification {
            status: raw.to_string(),
            ..PaymentVerification::default()
        }
        .classify();

        assert_eq!(status("paid"), VerificationStatus::Paid);
        assert_eq!(status("COMPLETED"), VerificationStatus::Paid);
        assert_eq!(status("failed"), VerificationStatus::Failed);
        assert_eq!(status("cancelled"), VerificationStatus::Cancelled);
        assert_eq!(status("processing"), VerificationStatus::Pending("processing".to_string()));
        assert_eq!(status(" "), VerificationStatus::Pending(String::new()));
    }

    #[test]
    fn test_create_order_body() {
        let request = CreateOrderRequest {
            items: vec![OrderLine {
                ticket_type_id: "tt-1".into(),
                quantity: 2,
            }],
            billing: BillingInfo {
                name: "Kofi".to_string(),
                email: "kofi@example.com".to_string(),
                phone: "0244000000".to_string(),
            },
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "items": [{"ticket_type_id": "tt-1", "quantity": 2}],
                "name": "Kofi",
                "email": "kofi@example.com",
                "phone": "0244000000"
            })
        );
    }
}
