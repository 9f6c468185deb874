//! Google Gemini (Generative Language API) backend.

pub mod client;
pub mod types;

pub use client::GeminiClient;
pub use types::GenerationConfig;
