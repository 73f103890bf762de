//! # MLIP Testing Utils
//!
//! Shared testing utilities for the active-learning workspace.
//! These fakes replace the external collaborators (cluster submission,
//! completion signal, poll clock) so pool and controller behaviour can be
//! tested without a batch scheduler.
//!
//! ## Features
//!
//! - **Scripted submitter**: runs a closure in the task workspace instead of `bsub`
//! - **Latency signal**: completes each job after a fixed number of polls
//! - **Counting timer**: records poll waits without sleeping
//! - **Cancellation stubs**: trigger the pool's cancellation hook after N checks
//! - **Structure builders**: small distinguishable XYZ frames
//! - **Fake cluster**: stage-aware scripted jobs plus a run-directory layout
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! mlip-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod cluster;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use cluster::*;
pub use helpers::*;
pub use mocks::*;
