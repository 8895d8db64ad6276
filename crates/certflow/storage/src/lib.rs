//! Certflow storage abstractions.
//!
//! This crate defines the persistence contract the review handlers rely on:
//! - application records with optimistic, version-checked writes
//! - certificates stored at most once per application
//!
//! Two adapters ship with it: [`memory::InMemoryStore`] for tests and
//! local runs, and [`rest::RestStore`] for the portal backend's HTTP API.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
pub mod rest;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use rest::RestStore;
pub use traits::{
    ApplicationFilter, ApplicationStore, CertflowStorage, CertificateStore, QueryWindow,
};
