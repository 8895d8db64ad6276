//! Certificate application review engine.
//!
//! An application moves through an ordered chain of reviewing stages
//! (SVRO → MVRO → RI → MRO by default). Each stage's officer approves,
//! rejects, raises a recheck against an earlier stage or attaches a report.
//! Approval at the last stage completes the application and issues its
//! certificate.
//!
//! The crate is split the same way the flow is:
//! - [`StageRegistry`]: stage order and who may act where
//! - [`WorkflowEngine`]: pure transitions with a fixed check order
//! - [`ReviewHandler`]: actor resolution, optimistic persistence with
//!   retry, and issuance on completion
//! - [`CertificateIssuer`]: one certificate per completed application
//!
//! ```
//! use certflow_engine::{StageRegistry, WorkflowEngine};
//! use certflow_types::{Actor, ApplicantDetails, ReviewAction, Role, Status};
//! use chrono::Utc;
//!
//! let engine = WorkflowEngine::new(StageRegistry::standard());
//! let applicant = Actor::new("applicant-1", "Lakshmi Devi", Role::Applicant);
//! let svro = Actor::new("svro-1", "Ramesh", Role::Svro);
//!
//! let app = engine
//!     .open(&applicant, ApplicantDetails::new("Lakshmi Devi", "123412341234", "BC-A"), Utc::now())
//!     .unwrap();
//! let next = engine.apply(&app, &svro, &ReviewAction::approve(), Utc::now()).unwrap();
//! assert_eq!(next.application.status(), Status::Pending);
//! assert_eq!(next.application.history.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod handlers;
pub mod identity;
pub mod issuance;
pub mod registry;
pub mod render;
pub mod state_machine;

pub use config::{CertificateConfig, PersistenceConfig, WorkflowConfig};
pub use handlers::{ActionOutcome, ReviewHandler};
pub use identity::{IdentityProvider, StaticDirectory};
pub use issuance::CertificateIssuer;
pub use registry::{NextStage, StageRegistry};
pub use render::{document_digest, CertificateRenderer, JsonCertificateRenderer};
pub use state_machine::{Transition, WorkflowEngine};
