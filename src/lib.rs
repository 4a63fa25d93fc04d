//! Builds the `PrincipalsByEmail` lookup table from the `Principals` table.
//!
//! A run scans every principal, checks that each user has a present, valid
//! and unique email, and writes any violations to `invalid-users.csv`. Only a
//! fully clean dataset is migrated; otherwise the run stops with status 1 so
//! the reported principals can be fixed by hand and the tool re-run.

pub mod config;
pub mod error;
pub mod migrator;
pub mod orchestrator;
pub mod reporter;
pub mod storage;
pub mod types;
pub mod uniqueness;
pub mod validator;
