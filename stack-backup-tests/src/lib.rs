//! Test utilities for stack-backup
//!
//! This crate provides shared test utilities, fixtures and re-exported mock
//! implementations for testing the stack-backup crate.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let (config, _dir) = ConfigBuilder::new()
//!         .add_project("app")
//!         .persist();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use stack_backup::config::{Config, IntegrationConfig, IntegrationKind, StorageConfig};
pub use stack_backup::integrations::{IntegrationRegistry, StepOutcome};

// Re-export mock implementations from the main crate
pub use stack_backup::utils::docker_ops::mock::{ContainerCall, MockContainerOps};
pub use stack_backup::utils::docker_ops::ContainerOperations;
pub use stack_backup::utils::executor::mock::{MockExecutor, MockResponse};
pub use stack_backup::utils::executor::{CommandExecutor, RealExecutor};
pub use stack_backup::utils::store_ops::mock::{MemoryStore, StoreCall};
pub use stack_backup::utils::store_ops::ObjectStore;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
