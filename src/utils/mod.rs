pub mod command;
pub mod docker;
pub mod locker;
pub mod s3;

// Trait-based abstractions for testability
pub mod executor;
pub mod docker_ops;
pub mod store_ops;

// Re-export commonly used types and traits (used by test crate)
pub use executor::{CommandExecutor, RealExecutor};
pub use docker_ops::{ContainerOperations, RealDockerOps};
pub use store_ops::{ObjectStore, ObjectSummary};
