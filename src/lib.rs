//! # Lodestore
//!
//! An embeddable, Redis-compatible in-memory keyspace engine.
//!
//! Lodestore owns the canonical map of key → value, arbitrates concurrent
//! access through per-key reader-writer locks with deadlock-free multi-key
//! ordering, and routes RESP command arrays to typed handlers for strings,
//! lists, hashes, sets and sorted sets. The TCP accept loop, TLS and RESP
//! request framing live in the embedding host; the host hands the engine a
//! parsed command array and writes back the reply bytes it returns.

pub mod api;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod expiry;
pub mod keyspace;
pub mod resp;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::Config;
pub use context::Context;
pub use error::{StoreError, StoreResult};
pub use resp::Reply;
pub use store::Store;
