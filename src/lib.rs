#![deny(missing_docs)]
//! Herbarium Bot library.
//!
//! A Telegram front end for a small photo catalog: categories ("species")
//! live as directories next to a JSON index, an admin uploads photos behind
//! a password challenge, and anyone can browse counts or ask for a random
//! picture.

/// Authorization window and password challenge.
pub mod auth;
/// Telegram transport implementation.
pub mod bot;
/// Configuration management.
pub mod config;
/// Conversation state machine.
pub mod controller;
/// Text rendering and menu labels.
pub mod presentation;
/// Telegram runtime entrypoint.
pub mod runner;
/// Per-conversation session record.
pub mod session;
/// Catalog index and media directories.
pub mod storage;
/// Utility functions.
pub mod utils;
