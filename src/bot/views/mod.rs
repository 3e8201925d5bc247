//! View layer for bot UI components
//!
//! Contains keyboards for the catalog menus.

pub mod catalog;

pub use catalog::*;
