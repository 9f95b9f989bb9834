//! Rumbo core: domain models, canonical codecs and the local-first sync engine.
//!
//! The crate is organised leaf-first: entity models with their wire codecs
//! (`tasks`, `goals`, `ledger`), the in-memory store with durable dirty
//! tracking (`store`), and the pull/push orchestration on top (`sync`).

pub mod errors;
pub mod goals;
pub mod ledger;
pub mod store;
pub mod sync;
pub mod tasks;
pub mod utils;

pub use errors::{Error, Result};
