//! `boxoffice`: inspect the persisted cart and the signed-in user's tickets.
//!
//! ```text
//! boxoffice cart              # lines, count and total of the stored cart
//! boxoffice orders [status]   # cached orders, optionally filtered by status
//! boxoffice tickets           # tickets of paid orders
//! ```
//!
//! Configuration comes from `BOXOFFICE_*` environment variables (a `.env`
//! file is read first when present).

use anyhow::Context;
use boxoffice_core::environment::SystemClock;
use boxoffice_storefront::api::HttpBackend;
use boxoffice_storefront::auth::{AuthFacade, StaticAuth, UserIdentity};
use boxoffice_storefront::storage::FileStorage;
use boxoffice_storefront::types::OrderStatus;
use boxoffice_storefront::{CartStore, Config, OrderQueryFacade};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=info,boxoffice_storefront=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let command = std::env::args().nth(1).unwrap_or_else(|| "cart".to_string());
    let argument = std::env::args().nth(2);

    let auth = Arc::new(match config.auth.user_id.clone() {
        Some(user_id) => StaticAuth::signed_in(UserIdentity::new(user_id), config.auth.token.clone()),
        None => StaticAuth::anonymous(),
    });

    match command.as_str() {
        "cart" => show_cart(&config).await,
        "orders" => {
            let status = argument.as_deref().map(OrderStatus::parse);
            show_orders(&config, auth, status).await
        },
        "tickets" => show_tickets(&config, auth).await,
        other => anyhow::bail!("unknown command {other:?}; expected cart, orders or tickets"),
    }
}

async fn show_cart(config: &Config) -> anyhow::Result<()> {
    let storage = Arc::new(FileStorage::new(&config.storage.dir));
    let cart = CartStore::new(storage, Arc::new(SystemClock));
    cart.hydrate().await.context("could not load the stored cart")?;

    for line in cart.lines().await {
        tracing::info!(
            line = %line.id,
            event = %line.event.title,
            tickets = ?line.tickets,
            subtotal = %line.subtotal(),
            "Cart line"
        );
    }
    tracing::info!(count = cart.count().await, total = %cart.total().await, "Cart");

    cart.shutdown(SHUTDOWN_TIMEOUT).await?;
    Ok(())
}

async fn load_orders(config: &Config, auth: Arc<StaticAuth>) -> anyhow::Result<OrderQueryFacade> {
    if !auth.is_authenticated() {
        tracing::warn!("BOXOFFICE_USER_ID is not set; nothing to show");
    }

    let backend = Arc::new(HttpBackend::new(&config.api, auth.clone())?);
    tracing::info!(base_url = backend.base_url(), "Loading orders");

    let facade = OrderQueryFacade::new(backend, auth);
    facade.refresh_and_wait(config.api.timeout()).await?;

    if let Some(error) = facade.error().await {
        anyhow::bail!(error);
    }
    Ok(facade)
}

async fn show_orders(
    config: &Config,
    auth: Arc<StaticAuth>,
    status: Option<OrderStatus>,
) -> anyhow::Result<()> {
    let facade = load_orders(config, auth).await?;

    for order in facade.get_by_status(status).await {
        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            total = %order.total_amount,
            items = order.items.len(),
            "Order"
        );
    }

    facade.shutdown(SHUTDOWN_TIMEOUT).await?;
    Ok(())
}

async fn show_tickets(config: &Config, auth: Arc<StaticAuth>) -> anyhow::Result<()> {
    let facade = load_orders(config, auth).await?;

    let tickets = facade.tickets().await;
    for ticket in &tickets {
        tracing::info!(
            code = %ticket.ticket_code,
            ticket = %ticket.ticket_name,
            event = %ticket.event.title,
            venue = %ticket.event.venue_name,
            status = ticket.status.as_str(),
            order_id = %ticket.order.id,
            "Ticket"
        );
    }
    tracing::info!(tickets = tickets.len(), "Done");

    facade.shutdown(SHUTDOWN_TIMEOUT).await?;
    Ok(())
}
