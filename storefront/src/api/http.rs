//! `reqwest` adapter for the order and payment endpoints.

use super::{
    error_details, CreateOrderRequest, CreatedOrder, OrdersApi, PaymentInitRequest,
    PaymentInitResponse, PaymentVerification, PaymentsApi,
};
use crate::auth::AuthFacade;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{lenient, Order, OrderId};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Backend client over HTTP
///
/// Sends the auth facade's bearer token with every request and unwraps
/// `{ "data": … }` envelopes.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth: Arc<dyn AuthFacade>,
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    order_id: &'a OrderId,
    #[serde(flatten)]
    request: PaymentInitRequest,
}

impl HttpBackend {
    /// Create a client for the configured backend
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, auth: Arc<dyn AuthFacade>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json");

        match self.auth.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and read the body as JSON; non-success statuses become errors
    async fn execute(&self, builder: RequestBuilder) -> Result<(u16, Value), ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        let parsed = if body.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&body) {
                Ok(value) => value,
                Err(_) if !status.is_success() => Value::Null,
                Err(e) => return Err(ApiError::Decode(e.to_string())),
            }
        };

        if !status.is_success() {
            let (message, errors) = error_details(&parsed);
            tracing::debug!(status = status.as_u16(), ?message, "Backend rejected request");
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
                errors,
            });
        }

        Ok((status.as_u16(), unwrap_envelope(parsed)))
    }
}

/// `{ "data": x }` → `x`; anything else is returned as is
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut fields) if fields.get("data").is_some_and(|data| !data.is_null()) => {
            fields.remove("data").unwrap_or(Value::Null)
        },
        other => other,
    }
}

/// Finds the order array in `[…]`, `{orders: […]}` or `{data: […]}` (nested once)
fn order_list(value: Value) -> Result<Vec<Order>, ApiError> {
    match value {
        Value::Array(items) => Ok(lenient::elements(items)),
        Value::Object(mut fields) => match fields.remove("orders").or_else(|| fields.remove("data")) {
            Some(Value::Array(items)) => Ok(lenient::elements(items)),
            Some(nested @ Value::Object(_)) => order_list(nested),
            _ => Err(ApiError::Decode("expected a list of orders".to_string())),
        },
        Value::Null => Ok(Vec::new()),
        _ => Err(ApiError::Decode("expected a list of orders".to_string())),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl OrdersApi for HttpBackend {
    #[tracing::instrument(skip(self, request), fields(items = request.items.len()))]
    async fn create_order(&self, request: CreateOrderRequest) -> Result<CreatedOrder, ApiError> {
        let (status, body) = self
            .execute(self.request(Method::POST, "/orders").json(&request))
            .await?;

        CreatedOrder::from_response(status, &body)
    }

    #[tracing::instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        let (_, body) = self.execute(self.request(Method::GET, "/orders")).await?;
        order_list(body)
    }

    #[tracing::instrument(skip(self), fields(order_id = %id))]
    async fn get_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let (_, body) = self
            .execute(self.request(Method::GET, &format!("/orders/{id}")))
            .await?;

        match body {
            Value::Object(mut fields) if fields.get("order").is_some_and(Value::is_object) => {
                decode(fields.remove("order").unwrap_or(Value::Null))
            },
            other => decode(other),
        }
    }
}

#[async_trait]
impl PaymentsApi for HttpBackend {
    #[tracing::instrument(skip(self, order_id, request), fields(order_id = %order_id, network = %request.network))]
    async fn initialize(
        &self,
        order_id: &OrderId,
        request: PaymentInitRequest,
    ) -> Result<PaymentInitResponse, ApiError> {
        let body = InitializeBody { order_id, request };
        let (_, response) = self
            .execute(self.request(Method::POST, "/payments/initialize").json(&body))
            .await?;

        decode(response)
    }

    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    async fn verify(&self, order_id: &OrderId) -> Result<PaymentVerification, ApiError> {
        let (_, response) = self
            .execute(self.request(Method::GET, &format!("/payments/verify/{order_id}")))
            .await?;

        decode(response)
    }
}
