//! Telegram bot implementation

/// Command router and message handlers
pub mod handlers;
