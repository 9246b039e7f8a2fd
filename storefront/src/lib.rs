//! Box Office storefront core: the cart-to-paid-ticket lifecycle.
//!
//! Every stateful piece is a reducer run by a [`boxoffice_runtime::Store`]
//! and handed to its consumers explicitly; nothing is global.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  order lines   ┌──────────────────┐  create / init / verify  ┌─────────┐
//! │  CartStore   │ ─────────────▶ │ CheckoutSession  │ ───────────────────────▶ │ Backend │
//! │ (persisted)  │ ◀── clear ──── │ (countdown, poll)│                          └─────────┘
//! └──────────────┘                └──────────────────┘                               ▲
//!                                          │ record_payment                          │ list / get
//!                                          ▼                                         │
//!                                 ┌──────────────────┐   tickets::project   ─────────┘
//!                                 │ OrderQueryFacade │
//!                                 └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let cart = CartStore::new(storage, Arc::new(SystemClock));
//! cart.hydrate().await?;
//! cart.add_line(event, BTreeMap::from([("VIP".to_string(), 2)])).await?;
//!
//! let session = CheckoutSession::start(&config.checkout, environment, cart.clone()).await?;
//! session.update_billing(billing).await?;
//! session.submit().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod mocks;
pub mod navigation;
pub mod orders;
pub mod storage;
pub mod tickets;
pub mod types;

pub use cart::{CartHandle, CartStore};
pub use checkout::{CheckoutEnvironment, CheckoutPhase, CheckoutSession, PurchaseSink};
pub use config::Config;
pub use error::{ApiError, CheckoutError, ConfigError, QueryError, StorageError};
pub use orders::OrderQueryFacade;
