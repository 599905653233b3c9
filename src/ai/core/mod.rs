//! Core AI provider types, traits, and utilities
//!
//! This module contains the provider traits used by the retrieval subsystem
//! (embeddings and chat completion) together with the shared HTTP client builder.

pub mod provider_base;
pub mod providers;

pub use provider_base::*;
pub use providers::*;
