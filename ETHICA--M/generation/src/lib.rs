#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Generation adapter: a uniform, fallible text-generation port.

/// Client trait, error type, and offline/test clients.
#[path = "../client.rs"]
pub mod client;

/// OpenAI-compatible HTTP backend.
#[path = "../openai.rs"]
pub mod openai;

pub use client::{
    GenerationClient, GenerationError, LoopbackGenerationClient, ScriptedGenerationClient,
};
pub use openai::HttpGenerationClient;
