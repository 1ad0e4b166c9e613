//! Core types and trait definitions for the Senator registry sync.
//!
//! This crate is deliberately free of database and runtime dependencies.
//! Store backends and the sync engine depend on it; it depends on nothing
//! proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod normalize;
pub mod record;
pub mod registry;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
