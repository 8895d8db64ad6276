//! Certificate Application Domain Types
//!
//! An application for a revenue certificate (caste, income, residence)
//! moves through an ordered chain of reviewing officers before a
//! certificate is issued.
//!
//! # Key Concepts
//!
//! - **Stage**: the reviewing role currently responsible for an
//!   application (`SVRO`, `MVRO`, `RI`, `MRO`).
//! - **Status**: where the application stands overall (`PENDING`,
//!   `REJECTED`, `COMPLETED`). Stage says *who*, status says *where*.
//! - **Application**: the routed record. Its state, applicant details and
//!   history are only ever extended, never rewritten.
//! - **HistoryEntry**: one accepted action, hash-linked to its predecessor.
//! - **RecheckRequest**: a side-channel re-verification that pauses
//!   progression without changing stage or status.
//! - **Certificate**: the artifact issued once an application completes.
//!
//! Stage and status are closed enums parsed once at the boundary. No
//! comparison against raw strings happens past that point.

#![deny(unsafe_code)]

mod action;
mod application;
mod certificate;
mod errors;
mod history;
mod ids;
mod stage;

pub use action::*;
pub use application::*;
pub use certificate::*;
pub use errors::*;
pub use history::*;
pub use ids::*;
pub use stage::*;
