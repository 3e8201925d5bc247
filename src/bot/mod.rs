/// Command, message and callback handlers
pub mod handlers;
/// Photo downloads through the Bot API
pub mod media;
/// Telegram calls with retries and graceful degradation
pub mod resilient;
/// Keyboards and inline markup
pub mod views;
