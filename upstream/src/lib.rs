//! Colon-tuple codec and client for the core-banking backend.
//!
//! Outbound requests are flat `KEY:VALUE:` tuple strings delivered as a
//! URL-encoded query parameter; responses come back in the same shape,
//! optionally wrapped in tag-like markers. This crate owns the codec, the
//! typed [`UpstreamEnvelope`], the HTTP client with its per-session
//! response cache, and the [`BankingApi`] seam the action modules are
//! written against.

pub mod client;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod mocks;

pub use client::{decode_envelope, BankingApi, UpstreamClient};
pub use config::UpstreamConfig;
pub use envelope::{is_success_status, CachedEnvelope, UpstreamEnvelope};
pub use mocks::MockBankingApi;
