//! Test support for readiness runs: a scripted in-memory [`Directory`]
//! and builders for the upstream rows it serves.
//!
//! Nothing here talks to a network. Production crates must only list this
//! crate under `[dev-dependencies]`.
//!
//! [`Directory`]: glr_odata::Directory

mod fake_directory;
mod fixtures;

pub use fake_directory::{FakeDirectory, RecordedCall};
pub use fixtures::{employment, job, row, user, user_without_status, JobBuilder};
