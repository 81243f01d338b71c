//! Stack Backup Library
//!
//! Backup, upload and restore orchestration for stateful project directories
//! on a container host.

pub mod backup;
pub mod config;
pub mod integrations;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config, ConfigError};
pub use integrations::{DatabaseIntegration, IntegrationRegistry, StepOutcome};
pub use managers::backup::{BackupError, BackupManager, BackupSummary};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::remote::RemoteTarget;
pub use managers::restore::{
    ReconnectOutcome, RestoreDestination, RestoreError, RestoreManager, RestoreReport, RestoreRequest,
};
pub use managers::upload::{UploadError, UploadManager, UploadSummary};
