//! Suitesync: Declarative Test Case Synchronization
//!
//! Builds a case tree from local Gherkin feature files, fetches the suite/case
//! tree kept by a remote test management service, and reconciles the two into a
//! merged tree annotated with the create/update/delete operations needed to
//! make the remote side match the local side.

pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod source;
pub mod sync;
pub mod title;
pub mod tooling;
pub mod tree;
