//! Cart reducer: line mutations, aggregates, and persistence effects.

use crate::storage::ClientStorage;
use crate::types::{CartLine, CartLineId, EventSnapshot, Money, OrderLine};
use boxoffice_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Storage key of the cart blob
pub const CART_STORAGE_KEY: &str = "cart";

/// State of the cart
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartState {
    /// Lines in insertion order
    pub lines: Vec<CartLine>,
    /// Set once the persisted cart has been read; nothing is written before
    pub loaded: bool,
    /// Bumped by every change that must reach storage
    pub revision: u64,
}

impl CartState {
    /// Sum of all quantities
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lines.iter().map(CartLine::quantity).sum()
    }

    /// Σ quantity × price, priced from each line's snapshot
    #[must_use]
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// Whether the cart has no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Flatten to `{ticket_type_id, quantity}` pairs for order creation
    ///
    /// Names that no longer resolve against the line's snapshot are skipped.
    #[must_use]
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .flat_map(|line| {
                line.tickets.iter().filter_map(move |(name, &quantity)| {
                    match line.event.ticket_type(name) {
                        Some(ticket_type) if !ticket_type.id.is_empty() => Some(OrderLine {
                            ticket_type_id: ticket_type.id.clone(),
                            quantity,
                        }),
                        _ => {
                            tracing::warn!(line = %line.id, ticket = %name, "Ticket name has no ticket type id");
                            None
                        },
                    }
                })
            })
            .collect()
    }

    /// Find a line by id
    #[must_use]
    pub fn line(&self, id: CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id == id)
    }
}

/// Actions processed by the cart
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartAction {
    /// Read the persisted cart (once)
    Hydrate,
    /// The persisted cart was read
    Hydrated {
        /// Lines read from storage (empty when absent or malformed)
        lines: Vec<CartLine>,
    },
    /// Add a new line; never merges with existing lines
    AddLine {
        /// Event snapshot to copy into the line
        event: EventSnapshot,
        /// Ticket type name → quantity; zero quantities are dropped
        tickets: BTreeMap<String, u32>,
    },
    /// Remove a line; no-op if absent
    RemoveLine {
        /// Line to remove
        id: CartLineId,
    },
    /// Upsert (`> 0`) or delete (`<= 0`) a quantity
    SetQuantity {
        /// Line to edit; unknown ids are ignored
        line_id: CartLineId,
        /// Ticket type name
        ticket_name: String,
        /// New quantity
        quantity: i64,
    },
    /// Empty the cart and erase the persisted blob
    Clear,
}

/// Serializes writes so an older snapshot never overwrites a newer one
#[derive(Debug, Default)]
pub struct CartPersistence {
    written: Mutex<u64>,
}

impl CartPersistence {
    async fn write(
        &self,
        storage: &dyn ClientStorage,
        revision: u64,
        blob: Option<String>,
    ) {
        let mut written = self.written.lock().await;
        if *written >= revision {
            tracing::trace!(revision, written = *written, "Skipping superseded cart write");
            return;
        }

        let result = match blob {
            Some(blob) => storage.set(CART_STORAGE_KEY, &blob).await,
            None => storage.remove(CART_STORAGE_KEY).await,
        };

        match result {
            Ok(()) => *written = revision,
            Err(error) => {
                metrics::counter!("cart.persist.failures").increment(1);
                tracing::warn!(%error, revision, "Failed to persist cart");
            },
        }
    }
}

/// Environment for the cart reducer
#[derive(Clone)]
pub struct CartEnvironment {
    /// Durable client storage
    pub storage: Arc<dyn ClientStorage>,
    /// Clock for line timestamps and ids
    pub clock: Arc<dyn Clock>,
    /// Write ordering
    pub persistence: Arc<CartPersistence>,
}

impl CartEnvironment {
    /// Environment over the given storage and clock
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            persistence: Arc::new(CartPersistence::default()),
        }
    }
}

/// Parse a stored blob; anything malformed is an empty cart
#[must_use]
pub fn decode_lines(blob: &str) -> Vec<CartLine> {
    match serde_json::from_str::<Vec<CartLine>>(blob) {
        Ok(mut lines) => {
            lines.retain_mut(CartLine::normalize);
            lines
        },
        Err(error) => {
            tracing::warn!(%error, "Stored cart is malformed; starting empty");
            Vec::new()
        },
    }
}

/// Reducer for the cart
#[derive(Clone, Copy, Debug, Default)]
pub struct CartReducer;

impl CartReducer {
    fn load(env: &CartEnvironment) -> Effect<CartAction> {
        let storage = Arc::clone(&env.storage);

        Effect::Future(Box::pin(async move {
            let lines = match storage.get(CART_STORAGE_KEY).await {
                Ok(Some(blob)) => decode_lines(&blob),
                Ok(None) => Vec::new(),
                Err(error) => {
                    tracing::warn!(%error, "Could not read stored cart; starting empty");
                    Vec::new()
                },
            };
            Some(CartAction::Hydrated { lines })
        }))
    }

    /// Persist the current lines if the stored cart has been read
    fn persist(state: &mut CartState, env: &CartEnvironment) -> SmallVec<[Effect<CartAction>; 4]> {
        if !state.loaded {
            tracing::debug!("Cart not loaded yet; skipping persist");
            return SmallVec::new();
        }

        let blob = match serde_json::to_string(&state.lines) {
            Ok(blob) => blob,
            Err(error) => {
                metrics::counter!("cart.persist.failures").increment(1);
                tracing::warn!(%error, "Failed to serialize cart");
                return SmallVec::new();
            },
        };

        state.revision += 1;
        smallvec![Self::write(env, state.revision, Some(blob))]
    }

    fn write(env: &CartEnvironment, revision: u64, blob: Option<String>) -> Effect<CartAction> {
        let storage = Arc::clone(&env.storage);
        let persistence = Arc::clone(&env.persistence);

        Effect::Future(Box::pin(async move {
            persistence.write(storage.as_ref(), revision, blob).await;
            None
        }))
    }
}

impl Reducer for CartReducer {
    type State = CartState;
    type Action = CartAction;
    type Environment = CartEnvironment;

    fn reduce(
        &self,
        state: &mut CartState,
        action: CartAction,
        env: &CartEnvironment,
    ) -> SmallVec<[Effect<CartAction>; 4]> {
        match action {
            CartAction::Hydrate => {
                if state.loaded {
                    return SmallVec::new();
                }
                smallvec![Self::load(env)]
            },

            CartAction::Hydrated { lines } => {
                if state.loaded {
                    tracing::debug!("Ignoring duplicate cart hydration");
                    return SmallVec::new();
                }
                tracing::info!(lines = lines.len(), "Cart hydrated");
                state.lines = lines;
                state.loaded = true;
                SmallVec::new()
            },

            CartAction::AddLine { event, tickets } => {
                let added_at = env.clock.now();
                let mut line = CartLine {
                    id: CartLineId::at(added_at),
                    event,
                    tickets,
                    added_at,
                };
                if !line.normalize() {
                    tracing::debug!("Ignoring add with no tickets");
                    return SmallVec::new();
                }

                tracing::debug!(line = %line.id, event = %line.event.id, "Line added");
                state.lines.push(line);
                Self::persist(state, env)
            },

            CartAction::RemoveLine { id } => {
                let before = state.lines.len();
                state.lines.retain(|line| line.id != id);
                if state.lines.len() == before {
                    return SmallVec::new();
                }
                Self::persist(state, env)
            },

            CartAction::SetQuantity {
                line_id,
                ticket_name,
                quantity,
            } => {
                let Some(index) = state.lines.iter().position(|line| line.id == line_id) else {
                    tracing::debug!(line = %line_id, "Quantity change for unknown line");
                    return SmallVec::new();
                };

                let line = &mut state.lines[index];
                match u32::try_from(quantity) {
                    Ok(quantity) if quantity > 0 => {
                        line.tickets.insert(ticket_name, quantity);
                    },
                    Ok(_) => {
                        line.tickets.remove(&ticket_name);
                    },
                    // Above u32::MAX clamps
                    Err(_) if quantity > 0 => {
                        line.tickets.insert(ticket_name, u32::MAX);
                    },
                    Err(_) => {
                        line.tickets.remove(&ticket_name);
                    },
                }

                if line.tickets.is_empty() {
                    state.lines.remove(index);
                }
                Self::persist(state, env)
            },

            CartAction::Clear => {
                state.lines.clear();
                state.revision += 1;
                smallvec![Self::write(env, state.revision, None)]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{TicketType, TicketTypeId};
    use boxoffice_core::environment::Clock;
    use boxoffice_testing::{assertions, test_clock, ReducerTest};

    fn environment() -> CartEnvironment {
        CartEnvironment::new(Arc::new(MemoryStorage::new()), Arc::new(test_clock()))
    }

    fn event() -> EventSnapshot {
        EventSnapshot {
            id: "ev-1".into(),
            title: "Highlife Night".to_string(),
            ticket_types: vec![
                TicketType {
                    id: TicketTypeId::new("tt-regular"),
                    name: "Regular".to_string(),
                    price: Money::from_minor(5000),
                    ..TicketType::default()
                },
                TicketType {
                    id: TicketTypeId::new("tt-vip"),
                    name: "VIP".to_string(),
                    price: Money::from_minor(15000),
                    ..TicketType::default()
                },
            ],
            ..EventSnapshot::default()
        }
    }

    fn line(tickets: &[(&str, u32)]) -> CartLine {
        CartLine {
            id: CartLineId::at(test_clock().now()),
            event: event(),
            tickets: tickets.iter().map(|(n, q)| ((*n).to_string(), *q)).collect(),
            added_at: test_clock().now(),
        }
    }

    fn loaded(lines: Vec<CartLine>) -> CartState {
        CartState {
            lines,
            loaded: true,
            revision: 0,
        }
    }

    #[test]
    fn test_add_line_never_merges() {
        let existing = line(&[("VIP", 1)]);

        ReducerTest::new(CartReducer)
            .with_env(environment())
            .given_state(loaded(vec![existing.clone()]))
            .when_action(CartAction::AddLine {
                event: event(),
                tickets: BTreeMap::from([("VIP".to_string(), 2), ("Regular".to_string(), 0)]),
            })
            .then_state(move |state| {
                assert_eq!(state.lines.len(), 2);
                assert_ne!(state.lines[1].id, existing.id);
                assert_eq!(state.lines[1].tickets, BTreeMap::from([("VIP".to_string(), 2)]));
                assert_eq!(state.lines[1].added_at, test_clock().now());
                assert_eq!(state.count(), 3);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_add_with_only_zero_quantities_adds_nothing() {
        ReducerTest::new(CartReducer)
            .with_env(environment())
            .given_state(loaded(vec![]))
            .when_action(CartAction::AddLine {
                event: event(),
                tickets: BTreeMap::from([("VIP".to_string(), 0)]),
            })
            .then_state(|state| assert!(state.is_empty()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_negative_quantity_removes_key_and_empty_line() {
        let target = line(&[("VIP", 1)]);
        let id = target.id;

        ReducerTest::new(CartReducer)
            .with_env(environment())
            .given_state(loaded(vec![target]))
            .when_action(CartAction::SetQuantity {
                line_id: id,
                ticket_name: "VIP".to_string(),
                quantity: -5,
            })
            .then_state(|state| assert!(state.lines.is_empty()))
            .run();
    }

    #[test]
    fn test_zero_quantity_removes_only_that_key() {
        let target = line(&[("VIP", 1), ("Regular", 2)]);
        let id = target.id;

        ReducerTest::new(CartReducer)
            .with_env(environment())
            .given_state(loaded(vec![target]))
            .when_action(CartAction::SetQuantity {
                line_id: id,
                ticket_name: "VIP".to_string(),
                quantity: 0,
            })
            .then_state(move |state| {
                let line = state.line(id).unwrap();
                assert_eq!(line.tickets, BTreeMap::from([("Regular".to_string(), 2)]));
            })
            .run();
    }

    #[test]
    fn test_unknown_line_is_silent_noop() {
        let existing = line(&[("VIP", 1)]);
        let unknown = CartLineId::at(test_clock().now());

        ReducerTest::new(CartReducer)
            .with_env(environment())
            .given_state(loaded(vec![existing]))
            .when_action(CartAction::SetQuantity {
                line_id: unknown,
                ticket_name: "VIP".to_string(),
                quantity: 4,
            })
            .then_state(|state| assert_eq!(state.count(), 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_total_uses_snapshot_prices() {
        let state = loaded(vec![
            line(&[("VIP", 2), ("Regular", 1)]),
            line(&[("Regular", 3), ("Backstage", 4)]),
        ]);

        // 2×150 + 1×50 + 3×50; Backstage has no type and contributes zero
        assert_eq!(state.total(), Money::from_minor(50_000));
        assert_eq!(state.count(), 10);
    }

    #[test]
    fn test_order_lines_flatten_by_type_id() {
        let state = loaded(vec![line(&[("VIP", 2)]), line(&[("Regular", 1), ("Ghost", 1)])]);

        assert_eq!(
            state.order_lines(),
            vec![
                OrderLine {
                    ticket_type_id: TicketTypeId::new("tt-vip"),
                    quantity: 2
                },
                OrderLine {
                    ticket_type_id: TicketTypeId::new("tt-regular"),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn test_mutation_before_load_does_not_persist() {
        ReducerTest::new(CartReducer)
            .with_env(environment())
            .given_state(CartState::default())
            .when_action(CartAction::AddLine {
                event: event(),
                tickets: BTreeMap::from([("VIP".to_string(), 1)]),
            })
            .then_state(|state| {
                assert_eq!(state.count(), 1);
                assert_eq!(state.revision, 0);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_hydrated_is_applied_once() {
        let stored = vec![line(&[("VIP", 2)])];

        ReducerTest::new(CartReducer)
            .with_env(environment())
            .given_state(CartState::default())
            .given_actions(vec![CartAction::Hydrated { lines: stored }])
            .when_action(CartAction::Hydrated { lines: vec![] })
            .then_state(|state| {
                assert!(state.loaded);
                assert_eq!(state.count(), 2);
            })
            .run();
    }

    #[test]
    fn test_decode_lines_tolerates_garbage() {
        assert!(decode_lines("{not json").is_empty());
        assert!(decode_lines(r#"{"lines": 3}"#).is_empty());

        let mut stored = line(&[("VIP", 1)]);
        stored.tickets.insert("Regular".to_string(), 0);
        let blob = serde_json::to_string(&vec![stored, line(&[("VIP", 0)])]).unwrap();

        let lines = decode_lines(&blob);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].tickets.len(), 1);
    }
}
