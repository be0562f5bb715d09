//! Chat transport adapters

pub mod telegram;

pub use telegram::TelegramMessenger;
