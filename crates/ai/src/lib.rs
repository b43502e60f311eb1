//! LLM-backed executors.
//!
//! Sends each task to the Anthropic Messages API under a role prompt chosen
//! by its category and returns the reply as the task's artifact.

#![warn(missing_docs)]

pub mod brief;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;

pub use brief::{Persona, TaskBrief};
pub use client::{AnthropicClient, API_VERSION};
pub use config::{Credential, LlmConfig, API_KEY_VAR, BASE_URL_VAR, MODEL_VAR};
pub use error::{AiError, Result};
pub use executor::LlmExecutor;
