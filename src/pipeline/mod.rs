//! Pipeline stages for study-material generation.
//!
//! Each submodule implements one step, so each can be tested without a
//! model or a store.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ extract ──▶ render
//! (checks)  (base64)  (model)  (+repair)   (plain text)
//! ```
//!
//! 1. [`input`]: validate the request and sniff uploaded bytes
//! 2. [`encode`]: base64-wrap an attachment for the multimodal request
//! 3. [`llm`]: call the model with timeout and retry/backoff; the only
//!    stage with network I/O
//! 4. [`extract`]: recover and validate the JSON result, falling back
//!    instead of failing; [`repair`] holds the almost-JSON fixes it tries
//! 5. [`render`]: printable study sheet for a stored result

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod render;
pub mod repair;
