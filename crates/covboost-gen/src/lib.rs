//! covboost generation client
//!
//! Implements [`covboost_core::TestGenerator`] on top of an
//! OpenAI-compatible chat-completions endpoint.

pub mod client;
pub mod config;
pub mod error;
pub mod prompt;

pub use client::{ChatMessage, ChatRequest, ChatResponse, ModelsClient, Role};
pub use config::{GenConfig, DEFAULT_ENDPOINT};
pub use error::{GenError, Result};
pub use prompt::{build_messages, build_user_prompt, SYSTEM_PROMPT};
