//! Core types for the USSD session gateway.
//!
//! This crate holds the pieces every other crate leans on: the error
//! taxonomy, the key/value adapter (Redis and the in-memory test double),
//! and the session store with its typed session/slot model.
//!
//! # Architecture
//!
//! Sessions are stored in the KV cluster with:
//! - **Session blob**: `{prefix}:{msisdn}:{sessionId}:{shortcode|default}` → JSON [`session::Session`]
//! - **Start anchor**: `{sessionKey}:start` → creation millis as a decimal string
//! - **Slots**: `{sessionKey}:{slotName}` → JSON payloads with the session TTL

pub mod config;
pub mod error;
pub mod kv;
pub mod kv_memory;
pub mod kv_redis;
pub mod session;

pub use config::{RedisConfig, SessionConfig};
pub use error::{GatewayError, Result};
pub use kv::KvStore;
pub use kv_memory::MemoryKvStore;
pub use kv_redis::RedisKvStore;
pub use session::{AuthStatus, CustomerData, Session, SessionKey, SessionStore, Slot};
