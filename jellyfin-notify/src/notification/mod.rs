//! Broadcast engine: recipient selection, delivery, retry and handoff.

pub mod delivery;
pub mod format;
pub mod retry;
pub mod selection;
pub mod service;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{Broadcaster, DeliveryReport};
pub use retry::deliver_with_retry;
pub use selection::{Selection, select_recipients};
pub use service::BroadcastService;
pub use transport::{ChatTransport, InlineAction, SendError, TelegramTransport};
