//! Domain types for the storefront.
//!
//! Everything that crosses the backend boundary parses defensively: each field
//! has a default, ids accept strings or numbers, money accepts numbers or
//! numeric strings, and timestamps that fail to parse become `None`. Business
//! logic downstream never has to deal with a missing field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Lenient field parsers
// ============================================================================

/// `deserialize_with` helpers that never fail on an unexpected JSON shape.
pub(crate) mod lenient {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let raw = string(deserializer)?;
        Ok(if raw.trim().is_empty() { None } else { Some(raw) })
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
            Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            _ => false,
        })
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => parse_timestamp(&s),
            _ => None,
        })
    }

    pub fn instant<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        timestamp(deserializer).map(Option::unwrap_or_default)
    }

    /// Elements that fail to parse are dropped; a non-array becomes empty.
    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => elements(items),
            _ => Vec::new(),
        })
    }

    pub fn opt_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => Some(elements(items)),
            _ => None,
        })
    }

    pub fn elements<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(parsed) => Some(parsed),
                Err(error) => {
                    tracing::warn!(%error, "Skipping malformed list element");
                    None
                },
            })
            .collect()
    }

    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(naive.and_utc());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from its backend representation")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as sent by the backend
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the backend sent no usable id
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                lenient::string(deserializer).map(|id| Self(id.trim().to_owned()))
            }
        }
    };
}

record_id! {
    /// Backend identifier of an event
    EventId
}

record_id! {
    /// Backend identifier of a ticket type
    TicketTypeId
}

record_id! {
    /// Backend identifier of an order
    OrderId
}

record_id! {
    /// Backend identifier of an issued ticket
    TicketId
}

/// Identifier of a cart line, derived from its creation time
///
/// UUID v7: the leading bits encode the creation timestamp, the rest is random,
/// so two lines added within the same millisecond still get distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CartLineId(Uuid);

impl CartLineId {
    /// Creates an id for a line created at `time`
    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        let seconds = u64::try_from(time.timestamp()).unwrap_or(0);
        let timestamp =
            uuid::Timestamp::from_unix(uuid::NoContext, seconds, time.timestamp_subsec_nanos());
        Self(Uuid::new_v7(timestamp))
    }
}

impl fmt::Display for CartLineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (minor units to avoid floating point errors)
// ============================================================================

/// Represents money in minor units (pesewas, cents)
///
/// Parses from JSON numbers (`12`, `12.5`) and numeric strings (`"12.50"`),
/// both read as major units. Anything else, including negative amounts,
/// parses as zero. Serializes as a decimal string so that stored values read
/// back unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` value from major units with overflow checking
    #[must_use]
    pub const fn checked_from_major(major: u64) -> Option<Self> {
        match major.checked_mul(100) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Returns the amount in major units (rounded down)
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, clamping at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiplies by a quantity, clamping at the maximum
    #[must_use]
    pub const fn saturating_multiply(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Parses a non-negative decimal amount in major units
    ///
    /// Digits past the second decimal place are truncated.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));

        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut cents = fraction.chars().take(2).collect::<String>();
        while cents.len() < 2 {
            cents.push('0');
        }
        let cents: u64 = cents.parse().ok()?;

        whole.checked_mul(100)?.checked_add(cents).map(Self)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major(), self.0 % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(Self::checked_from_major)
                .or_else(|| Self::parse(&n.to_string())),
            serde_json::Value::String(s) => Self::parse(&s),
            _ => None,
        };
        Ok(amount.unwrap_or(Self::ZERO))
    }
}

// ============================================================================
// Event snapshot (copied into the cart at add time)
// ============================================================================

/// A purchasable ticket type, as shown on the event page
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketType {
    /// Backend id, used when the order is created
    pub id: TicketTypeId,
    /// Display name, unique within its event
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    /// List price
    pub price: Money,
    /// Discounted price, when a sale is configured
    #[serde(alias = "salePrice")]
    pub sale_price: Option<Money>,
    /// Price the buyer pays right now
    #[serde(alias = "effectivePrice")]
    pub effective_price: Money,
    /// Whether the sale price currently applies
    #[serde(alias = "isSaleActive", deserialize_with = "lenient::flag")]
    pub is_sale_active: bool,
    /// Per-attendee purchase limit (0 when the backend sets none)
    #[serde(alias = "maxPerAttendee", deserialize_with = "lenient::count")]
    pub max_per_attendee: u32,
}

/// Event data captured when a line is added to the cart
///
/// The ticket types are a snapshot: later backend price changes do not alter
/// what the cart displays.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSnapshot {
    /// Backend event id
    pub id: EventId,
    /// Event title
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    /// URL slug
    #[serde(deserialize_with = "lenient::string")]
    pub slug: String,
    /// Display date
    #[serde(deserialize_with = "lenient::string")]
    pub date: String,
    /// Display time
    #[serde(deserialize_with = "lenient::string")]
    pub time: String,
    /// Venue name
    #[serde(deserialize_with = "lenient::string")]
    pub venue: String,
    /// Venue location
    #[serde(deserialize_with = "lenient::string")]
    pub location: String,
    /// Banner image URL
    #[serde(deserialize_with = "lenient::opt_string")]
    pub image: Option<String>,
    /// Organizer name
    #[serde(deserialize_with = "lenient::string")]
    pub organizer: String,
    /// Ticket types at the time the line was added
    #[serde(alias = "ticketTypes", deserialize_with = "lenient::list")]
    pub ticket_types: Vec<TicketType>,
}

impl EventSnapshot {
    /// Finds a ticket type by name
    #[must_use]
    pub fn ticket_type(&self, name: &str) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| t.name == name)
    }
}

// ============================================================================
// Cart
// ============================================================================

/// One addition of tickets for an event
///
/// Quantities are keyed by ticket type name and are always positive; a line
/// whose map becomes empty is removed from the cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Creation-time-derived id
    pub id: CartLineId,
    /// Event snapshot taken at add time
    pub event: EventSnapshot,
    /// Ticket type name → quantity
    pub tickets: BTreeMap<String, u32>,
    /// When the line was added
    #[serde(alias = "addedAt", default, deserialize_with = "lenient::instant")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Number of tickets in this line
    #[must_use]
    pub fn quantity(&self) -> u64 {
        self.tickets.values().map(|&q| u64::from(q)).sum()
    }

    /// Σ quantity × list price; names missing from the snapshot contribute zero
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.tickets
            .iter()
            .map(|(name, &quantity)| {
                self.event
                    .ticket_type(name)
                    .map_or(Money::ZERO, |t| t.price.saturating_multiply(quantity))
            })
            .sum()
    }

    /// Drops zero quantities; returns whether anything is left
    pub fn normalize(&mut self) -> bool {
        self.tickets.retain(|_, quantity| *quantity > 0);
        !self.tickets.is_empty()
    }
}

/// A `{ticket_type_id, quantity}` pair sent when creating an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Ticket type being bought
    pub ticket_type_id: TicketTypeId,
    /// How many
    pub quantity: u32,
}

// ============================================================================
// Orders
// ============================================================================

/// Lifecycle status of a backend order
///
/// Unknown wire values are kept verbatim in `Unknown` rather than failing the
/// parse. Valid transitions: `Pending → {Paid, Failed, Cancelled}` and
/// `Paid → Refunded`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Created, awaiting payment
    Pending,
    /// Payment confirmed, tickets issued
    Paid,
    /// Payment failed
    Failed,
    /// Cancelled before payment
    Cancelled,
    /// Refunded after payment
    Refunded,
    /// Any status this client does not recognize
    Unknown(String),
}

impl OrderStatus {
    /// Parses a wire status, case-insensitively
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "paid" => Self::Paid,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            _ => Self::Unknown(raw.trim().to_owned()),
        }
    }

    /// Wire representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Failed | Self::Cancelled)
                | (Self::Paid, Self::Refunded)
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient::string(deserializer).map(|raw| Self::parse(&raw))
    }
}

/// Venue attached to a backend event record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueRecord {
    /// Venue name
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    /// Street address
    #[serde(deserialize_with = "lenient::string")]
    pub address: String,
}

/// Accepts a venue object or a bare venue name.
fn venue<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<VenueRecord>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        value @ serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
        serde_json::Value::String(name) if !name.trim().is_empty() => Some(VenueRecord {
            name,
            address: String::new(),
        }),
        _ => None,
    })
}

/// Event as embedded in an order item's ticket type
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    /// Backend event id
    pub id: EventId,
    /// Event title
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    /// URL slug
    #[serde(deserialize_with = "lenient::string")]
    pub slug: String,
    /// Banner image URL
    #[serde(alias = "bannerImage", deserialize_with = "lenient::opt_string")]
    pub banner_image: Option<String>,
    /// Venue, when the backend includes it
    #[serde(deserialize_with = "venue")]
    pub venue: Option<VenueRecord>,
    /// Start time
    #[serde(alias = "startTime", deserialize_with = "lenient::timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    /// End time
    #[serde(alias = "endTime", deserialize_with = "lenient::timestamp")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Ticket type as denormalized into an order item
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketTypeRecord {
    /// Backend id
    pub id: TicketTypeId,
    /// Display name
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    /// Price at purchase
    pub price: Money,
    /// Owning event
    pub event: Option<EventRecord>,
}

/// One ticket type and quantity within an order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderItem {
    /// Ticket type bought
    #[serde(alias = "ticketTypeId")]
    pub ticket_type_id: TicketTypeId,
    /// Denormalized ticket type with event metadata
    #[serde(alias = "ticketType")]
    pub ticket_type: Option<TicketTypeRecord>,
    /// How many
    #[serde(deserialize_with = "lenient::count")]
    pub quantity: u32,
    /// Price per ticket
    #[serde(alias = "unitPrice")]
    pub unit_price: Money,
    /// quantity × `unit_price`
    #[serde(alias = "totalPrice")]
    pub total_price: Money,
}

impl OrderItem {
    /// The ticket type id, falling back to the embedded record's id
    #[must_use]
    pub fn resolved_ticket_type_id(&self) -> Option<&TicketTypeId> {
        if !self.ticket_type_id.is_empty() {
            return Some(&self.ticket_type_id);
        }
        self.ticket_type
            .as_ref()
            .map(|t| &t.id)
            .filter(|id| !id.is_empty())
    }
}

/// Status of an issued ticket
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    /// Valid for entry
    Active,
    /// Already scanned
    Used,
    /// Voided
    Cancelled,
    /// Event is over
    Expired,
    /// Any status this client does not recognize
    Unknown(String),
}

impl TicketStatus {
    /// Parses a wire status, case-insensitively
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "used" => Self::Used,
            "cancelled" | "canceled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => Self::Unknown(raw.trim().to_owned()),
        }
    }

    /// Wire representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Unknown(raw) => raw.as_str(),
        }
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl Serialize for TicketStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TicketStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient::string(deserializer).map(|raw| Self::parse(&raw))
    }
}

/// An issued entry credential
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    /// Backend id
    pub id: TicketId,
    /// Human-readable code printed on the ticket
    #[serde(alias = "ticketCode", deserialize_with = "lenient::string")]
    pub ticket_code: String,
    /// Ticket status
    pub status: TicketStatus,
    /// Ticket type this ticket was issued for
    #[serde(alias = "ticketTypeId")]
    pub ticket_type_id: TicketTypeId,
    /// QR payload, when the backend provides one
    #[serde(alias = "qrCode", deserialize_with = "lenient::opt_string")]
    pub qr_code: Option<String>,
}

/// Backend record of a checkout attempt and its payment lifecycle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Backend id
    pub id: OrderId,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Items bought
    #[serde(alias = "order_items", alias = "orderItems", deserialize_with = "lenient::list")]
    pub items: Vec<OrderItem>,
    /// Sum of item totals
    pub subtotal: Money,
    /// Service fees
    pub fees: Money,
    /// Amount charged
    #[serde(alias = "totalAmount")]
    pub total_amount: Money,
    /// Gateway payment reference
    #[serde(alias = "paymentReference", deserialize_with = "lenient::opt_string")]
    pub payment_reference: Option<String>,
    /// Creation time
    #[serde(alias = "createdAt", deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Payment time
    #[serde(alias = "paidAt", deserialize_with = "lenient::timestamp")]
    pub paid_at: Option<DateTime<Utc>>,
    /// Issued tickets; absent until the order is paid
    #[serde(deserialize_with = "lenient::opt_list")]
    pub tickets: Option<Vec<Ticket>>,
}

// ============================================================================
// Ticket view model
// ============================================================================

/// Order context attached to a [`TicketView`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    /// Order id
    pub id: OrderId,
    /// Payment reference
    pub reference: Option<String>,
    /// Amount charged
    pub total_amount: Money,
    /// Payment time
    pub paid_at: Option<DateTime<Utc>>,
    /// Order status
    pub status: OrderStatus,
}

/// Event context attached to a [`TicketView`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// Event id
    pub id: EventId,
    /// Event title
    pub title: String,
    /// URL slug
    pub slug: String,
    /// Banner image URL
    pub banner_image: Option<String>,
    /// Venue name
    pub venue_name: String,
    /// Venue address
    pub address: String,
    /// Start time
    pub start_time: Option<DateTime<Utc>>,
    /// End time
    pub end_time: Option<DateTime<Utc>>,
}

/// A ticket flattened together with its order and event, ready for display
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TicketView {
    /// Ticket id
    pub id: TicketId,
    /// Human-readable code
    pub ticket_code: String,
    /// Ticket status
    pub status: TicketStatus,
    /// Ticket type id
    pub ticket_type_id: TicketTypeId,
    /// Owning order
    pub order: OrderSummary,
    /// Event the ticket admits to
    pub event: EventSummary,
    /// Ticket type name
    pub ticket_name: String,
    /// QR payload (falls back to the ticket code)
    pub qr_code: String,
}

// ============================================================================
// Billing
// ============================================================================

/// Payment network chosen at checkout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentNetwork {
    /// MTN mobile money
    #[default]
    #[serde(rename = "MTN")]
    Mtn,
    /// Vodafone cash
    #[serde(rename = "VODAFONE")]
    Vodafone,
    /// AirtelTigo money
    #[serde(rename = "AIRTELTIGO")]
    AirtelTigo,
    /// Card payment on the gateway's hosted page
    #[serde(rename = "CARD")]
    Card,
}

impl PaymentNetwork {
    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mtn => "MTN",
            Self::Vodafone => "VODAFONE",
            Self::AirtelTigo => "AIRTELTIGO",
            Self::Card => "CARD",
        }
    }

    /// Whether payment is charged directly to a phone wallet
    #[must_use]
    pub const fn is_mobile_money(&self) -> bool {
        !matches!(self, Self::Card)
    }
}

impl fmt::Display for PaymentNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buyer details collected by the checkout form
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingInfo {
    /// Full name
    pub name: String,
    /// Email for the receipt
    pub email: String,
    /// Phone number; required for mobile money
    pub phone: String,
}

impl BillingInfo {
    /// Names of the required fields that are blank
    #[must_use]
    pub fn missing_fields(&self, network: PaymentNetwork) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if network.is_mobile_money() && self.phone.trim().is_empty() {
            missing.push("phone");
        }
        missing
    }
}
