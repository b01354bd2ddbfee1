//! Byte-buffer boundary for hosts that receive events through fixed
//! callback slots instead of Tauri's event system.
//!
//! Each slot receives the JSON encoding of its payload, or `None` for the
//! content-free restore-completed event.

use crate::events::{Event, EventKind, EventSink};
use crate::models::*;

/// Fixed-signature callback receiving an encoded event payload.
pub type Callback = Box<dyn Fn(Option<&[u8]>) + Send + Sync>;

/// An [`EventSink`] writing each event to its own callback.
///
/// ```no_run
/// use tauri_plugin_apple_iap::bridge::{Callback, CallbackSlots};
/// use tauri_plugin_apple_iap::{IapConfig, NativeQueue, Store};
///
/// fn print(name: &'static str) -> Callback {
///     Box::new(move |buffer: Option<&[u8]>| {
///         println!("{name}: {:?}", buffer.map(String::from_utf8_lossy));
///     })
/// }
///
/// let slots = CallbackSlots {
///     on_products_updated: print("products"),
///     on_transactions_updated: print("transactions"),
///     on_restore_completed: print("restore"),
///     on_exception: print("exception"),
/// };
/// let store = Store::new(NativeQueue::new(), slots, IapConfig::default());
/// if store.initialize() {
///     store.query_products(["com.example.pro".to_string()].into_iter().collect())?;
/// }
/// # Ok::<(), tauri_plugin_apple_iap::Error>(())
/// ```
pub struct CallbackSlots {
    pub on_products_updated: Callback,
    pub on_transactions_updated: Callback,
    pub on_restore_completed: Callback,
    pub on_exception: Callback,
}

impl CallbackSlots {
    fn slot(&self, kind: EventKind) -> &Callback {
        match kind {
            EventKind::ProductsUpdated => &self.on_products_updated,
            EventKind::TransactionsUpdated => &self.on_transactions_updated,
            EventKind::RestoreCompleted => &self.on_restore_completed,
            EventKind::Exception => &self.on_exception,
        }
    }

    fn send(&self, kind: EventKind, buffer: crate::Result<Vec<u8>>) -> crate::Result<()> {
        let buffer = buffer?;
        (self.slot(kind))(Some(&buffer));
        Ok(())
    }
}

impl EventSink for CallbackSlots {
    fn on_products_updated(&self, products: &[Product]) -> crate::Result<()> {
        self.send(EventKind::ProductsUpdated, encode(&products))
    }

    fn on_transactions_updated(&self, transactions: &[Transaction]) -> crate::Result<()> {
        self.send(EventKind::TransactionsUpdated, encode(&transactions))
    }

    fn on_restore_completed(&self) -> crate::Result<()> {
        (self.on_restore_completed)(None);
        Ok(())
    }

    fn on_exception(&self, exception: &Exception) -> crate::Result<()> {
        self.send(EventKind::Exception, encode(exception))
    }
}

fn encode<T: serde::Serialize + ?Sized>(payload: &T) -> crate::Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(Into::into)
}

/// Decodes a buffer received on the `kind` slot.
///
/// Buffers that do not decode become a `JsonParse` exception carrying the
/// parser message.
pub fn decode(kind: EventKind, buffer: Option<&[u8]>) -> Event {
    let decoded = match (kind, buffer) {
        (EventKind::RestoreCompleted, _) => Ok(Event::RestoreCompleted),
        (_, None) => return parse_failure(kind, "empty buffer".to_string()),
        (EventKind::ProductsUpdated, Some(bytes)) => {
            serde_json::from_slice(bytes).map(Event::ProductsUpdated)
        }
        (EventKind::TransactionsUpdated, Some(bytes)) => {
            serde_json::from_slice(bytes).map(Event::TransactionsUpdated)
        }
        (EventKind::Exception, Some(bytes)) => serde_json::from_slice(bytes).map(Event::Exception),
    };
    decoded.unwrap_or_else(|error| parse_failure(kind, error.to_string()))
}

fn parse_failure(kind: EventKind, reason: String) -> Event {
    log::warn!("undecodable {} buffer: {}", kind.name(), reason);
    Event::Exception(Exception::new(
        ExceptionType::JsonParse,
        CODE_ENCODING_FAILED,
        format!("Failed to parse json: {reason}."),
    ))
}
