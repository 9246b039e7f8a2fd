//! Order → ticket projection.
//!
//! Turns backend orders into the flat [`TicketView`] list the ticket wallet
//! shows. Pure: same input, same output, no side effects.

use crate::types::{
    EventRecord, EventSummary, Order, OrderStatus, OrderSummary, Ticket, TicketTypeId,
    TicketTypeRecord, TicketView,
};
use std::collections::HashMap;

/// Project paid orders into ticket views
///
/// Only `Paid` orders with a non-empty `tickets` array contribute. Output
/// follows input order: orders as given, tickets within an order as given.
/// Ticket types and events are resolved through the order's items; a ticket
/// whose type cannot be resolved still gets a view, with empty type and event
/// data.
#[must_use]
pub fn project(orders: &[Order]) -> Vec<TicketView> {
    orders
        .iter()
        .filter(|order| order.status == OrderStatus::Paid)
        .filter_map(|order| {
            let tickets = order.tickets.as_deref().filter(|t| !t.is_empty())?;
            Some((order, tickets))
        })
        .flat_map(|(order, tickets)| {
            let lookup = type_lookup(order);
            let summary = order_summary(order);
            tickets
                .iter()
                .map(move |ticket| view(ticket, &summary, lookup.get(&ticket.ticket_type_id).copied()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `ticket_type_id → ticket type` from the order's items (first item wins)
fn type_lookup(order: &Order) -> HashMap<&TicketTypeId, &TicketTypeRecord> {
    let mut lookup = HashMap::new();
    for item in &order.items {
        if let (Some(id), Some(ticket_type)) = (item.resolved_ticket_type_id(), item.ticket_type.as_ref()) {
            lookup.entry(id).or_insert(ticket_type);
        }
    }
    lookup
}

fn order_summary(order: &Order) -> OrderSummary {
    OrderSummary {
        id: order.id.clone(),
        reference: order.payment_reference.clone(),
        total_amount: order.total_amount,
        paid_at: order.paid_at,
        status: order.status.clone(),
    }
}

fn event_summary(event: &EventRecord) -> EventSummary {
    let venue = event.venue.clone().unwrap_or_default();
    EventSummary {
        id: event.id.clone(),
        title: event.title.clone(),
        slug: event.slug.clone(),
        banner_image: event.banner_image.clone(),
        venue_name: venue.name,
        address: venue.address,
        start_time: event.start_time,
        end_time: event.end_time,
    }
}

fn view(ticket: &Ticket, order: &OrderSummary, ticket_type: Option<&TicketTypeRecord>) -> TicketView {
    let event = ticket_type
        .and_then(|t| t.event.as_ref())
        .map(event_summary)
        .unwrap_or_default();

    TicketView {
        id: ticket.id.clone(),
        ticket_code: ticket.ticket_code.clone(),
        status: ticket.status.clone(),
        ticket_type_id: ticket.ticket_type_id.clone(),
        order: order.clone(),
        event,
        ticket_name: ticket_type.map(|t| t.name.clone()).unwrap_or_default(),
        qr_code: ticket
            .qr_code
            .clone()
            .unwrap_or_else(|| ticket.ticket_code.clone()),
    }
}
