//! Command tests for stack-backup
//!
//! These drive the managers behind each CLI command with a mocked container
//! runtime and an in-memory object store.

mod backup;
mod remote;
mod restore;
mod upload;
