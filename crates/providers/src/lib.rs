//! Model provider implementations for LoopWright.
//!
//! Currently one concrete provider: [`OpenAiCompatClient`], which works with
//! OpenAI, OpenRouter, Ollama, vLLM, and any other endpoint exposing an
//! OpenAI-compatible `/chat/completions` API.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;
