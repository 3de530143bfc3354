//! LLM provider implementations for IronTask.
//!
//! The agent loop consumes the [`irontask_core::Provider`] trait; this crate
//! supplies the concrete backends: an OpenAI-compatible HTTP client and a
//! retry decorator that makes any provider resilient to transient failures.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryProvider};
