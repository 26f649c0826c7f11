//! Key namespace for every entry the protocol keeps in the atomic store.
//!
//! # Key Format
//!
//! | Entity | Key |
//! |---|---|
//! | Stock counter | `flash_sale:stock:{event}` |
//! | Sold-out flag | `flash_sale:sold_out:{event}` |
//! | Participation flag | `flash_sale:participation:{event}:user` |
//! | Idempotency marker | `flash_sale:idempotency:message_id` |
//! | Event info | `flash_sale:event_info:{event}` |
//!
//! The event id is wrapped in a `{...}` hash tag so every key touched by one
//! reservation script lands in the same Redis Cluster slot. The kind segment
//! differs per entity and numeric ids are always delimited, so
//! `event=12,user=3` and `event=1,user=23` can never produce the same key.

use crate::types::{EventId, UserId};

/// Prefix shared by all keys, so the protocol can live in a shared store.
pub const KEY_PREFIX: &str = "flash_sale";

/// Key of the remaining-unit counter for an event.
#[must_use]
pub fn stock_key(event_id: EventId) -> String {
    format!("{KEY_PREFIX}:stock:{{{event_id}}}")
}

/// Key of the sold-out marker for an event.
#[must_use]
pub fn sold_out_key(event_id: EventId) -> String {
    format!("{KEY_PREFIX}:sold_out:{{{event_id}}}")
}

/// Key of the participation marker for one user in one event.
#[must_use]
pub fn participation_key(event_id: EventId, user_id: UserId) -> String {
    format!("{KEY_PREFIX}:participation:{{{event_id}}}:{user_id}")
}

/// Key of the idempotency marker for a message or operation id.
#[must_use]
pub fn idempotency_key(message_id: &str) -> String {
    format!("{KEY_PREFIX}:idempotency:{message_id}")
}

/// Key of the cached descriptive metadata for an event.
#[must_use]
pub fn event_info_key(event_id: EventId) -> String {
    format!("{KEY_PREFIX}:event_info:{{{event_id}}}")
}

/// The ordered key list passed to the decrement and restore scripts.
///
/// Scripts address these as `KEYS[1]` (stock), `KEYS[2]` (sold-out) and
/// `KEYS[3]` (participation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationKeys {
    /// Stock counter key.
    pub stock: String,
    /// Sold-out flag key.
    pub sold_out: String,
    /// Participation flag key.
    pub participation: String,
}

impl ReservationKeys {
    /// Build the keys for one (event, user) reservation.
    #[must_use]
    pub fn new(event_id: EventId, user_id: UserId) -> Self {
        Self {
            stock: stock_key(event_id),
            sold_out: sold_out_key(event_id),
            participation: participation_key(event_id, user_id),
        }
    }

    /// Keys in script order.
    #[must_use]
    pub fn as_array(&self) -> [&str; 3] {
        [&self.stock, &self.sold_out, &self.participation]
    }
}
