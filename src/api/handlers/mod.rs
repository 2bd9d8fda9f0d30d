//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Service status handler.
pub mod health;
/// Question answering handlers.
pub mod query;
