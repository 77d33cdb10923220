//! Request normalization, SSE framing, and the streaming proxy pipeline.
//!
//! - [`normalize`] - body normalization (sanitization, content-array
//!   expansion, `o1` system-role rewrite, default `max_tokens`)
//! - [`sanitize`] - narrow content sanitizer
//! - [`sse`] - SSE frame parsing/synthesis and usage extraction
//! - [`stream`] - [`stream::StreamProxy`], the endpoint-facing pipeline

pub mod normalize;
pub mod sanitize;
pub mod sse;
pub mod stream;
