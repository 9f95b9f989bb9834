//! HTTP implementation of the Rumbo remote gateway contract.
//!
//! `rumbo-core` treats the remote store as an opaque collaborator behind the
//! `RemoteGateway` trait; this crate provides the REST client that fulfils
//! it.

pub mod client;
pub mod error;
pub mod types;

pub use client::HttpGateway;
pub use error::{RemoteError, Result};
