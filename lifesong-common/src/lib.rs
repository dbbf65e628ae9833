//! # Lifesong Common Library
//!
//! Shared code for the Lifesong services including:
//! - Event types (LifesongEvent enum) and the EventBus
//! - Clip types shared between the generation backend and event consumers
//! - TOML configuration loading
//! - Bounded retry with exponential backoff
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod retry;
pub mod sse;

pub use error::{Error, Result};
pub use retry::{retry_with_backoff, Backoff, RetryError, RetryPolicy};
