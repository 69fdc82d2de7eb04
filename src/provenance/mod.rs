//! Provenance — state hashing, append-only event log, drift detection.

pub mod drift;
pub mod eventlog;
pub mod hasher;
