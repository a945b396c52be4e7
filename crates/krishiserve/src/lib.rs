//! krishiserve - KrishiSahay HTTP/WebSocket Server
//!
//! Axum-based REST and WebSocket chat server for farmers, answering from the
//! agricultural knowledge base, the Kisan Call Centre corpus and IBM Watsonx.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Knowledge-base answer text and question helpers
pub mod answer;

/// Chat coordination over search, answers and conversation history
pub mod chat;

/// Command-line interface
pub mod cli;

/// Server configuration from TOML and environment
pub mod config;

/// API error types
pub mod error;

/// HTTP handlers for REST endpoints
pub mod handlers;

/// Language model collaborator
pub mod llm;

/// API request and response types
pub mod responses;

/// Server instance management
pub mod server;

/// Chat sessions and analytics
pub mod session;

/// WebSocket chat protocol
pub mod websocket;

pub use chat::{ChatCoordinator, ChatReply};
pub use config::{LlmConfig, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use handlers::{create_router, AppState};
pub use llm::{GeneratedAnswer, GenerationContext, ResponseGenerator, WatsonxClient};
pub use server::KrishiServer;
