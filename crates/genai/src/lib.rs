//! Generative-text integration - phrasing with a fail-soft boundary
//!
//! The dialog core decides *what* to say; this crate decides *how it is
//! worded* by calling a Gemini-style `generateContent` API. The boundary is
//! deliberately fail-soft: any client failure collapses to a fixed fallback
//! string, so a phrasing outage can never abort a dialog transition.
//!
//! # Key Types
//!
//! - `LlmClient` - pluggable completion trait
//! - `GeminiClient` - HTTP implementation over reqwest
//! - `LlmPhraser` - implements the core `Phraser` seam with the fallback

pub mod client;
pub mod phrasing;

pub use client::{GeminiClient, LlmClient, LlmError};
pub use phrasing::{LlmPhraser, PhrasingOutcome, FALLBACK_REPLY};
