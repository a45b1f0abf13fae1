//! Telegram Bot API binding - long-poll transport for the dialog engine
//!
//! This crate carries inbound updates to the dialog core and its replies
//! back to the user:
//! - **Wire types** (`wire`) - Bot API update payloads and classification
//!   into the three inputs the dialog understands (/start, photo, text)
//! - **API client** (`api`) - getUpdates/getFile/sendMessage/sendDocument
//!   over HTTPS, plus the `ReplySink` adapter the core consumes
//! - **Poller** (`poller`) - long-poll loop with reconnection/backoff,
//!   mirroring the degrade-without-crash policy of the rest of the system
//!
//! The dialog engine is polymorphic over `BotTransport`; any transport that
//! satisfies that contract (including the scripted fakes in the tests) works.

pub mod api;
pub mod poller;
pub mod wire;

pub use api::{BotTransport, HttpBotApi, NoopBotTransport, TelegramSink, TransportError};
pub use poller::{DispatchError, ReconnectPolicy, UpdateHandler, UpdatePoller};
pub use wire::{classify, Message, PhotoSize, TgUser, Update, UpdateKind};
