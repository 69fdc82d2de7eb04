//! Lanzar — declarative serverless provisioning.
//!
//! Roles and functions as code. Content-addressed artifacts. BLAKE3 state
//! hashing. Provenance tracing. The control plane stays external, behind a
//! narrow apply/current-state seam.

pub mod artifact;
pub mod cli;
pub mod core;
pub mod error;
pub mod provenance;
pub mod provider;
