//! Asistente Inteligente - Telegram bot
//!
//! A Telegram bot that answers static slash commands and forwards any other
//! text to a Gemini-backed agent able to call a weather lookup and a
//! restricted arithmetic evaluator.

/// Agent dispatcher with bounded tool-calling loop
pub mod agent;
/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// LLM types and the Gemini provider
pub mod llm;
/// Tool providers and registry
pub mod tools;
/// Response sanitization and message splitting
pub mod utils;
