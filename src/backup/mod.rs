//! Building blocks of a backup run: discovery, archiving and local retention

pub mod archive;
pub mod discover;
pub mod retention;

pub use archive::{remote_key, remote_key_for_file, Archiver, BackupArchive};
pub use discover::{discover_projects, ProjectDirectory};
pub use retention::{sweep_old_archives, SweepReport};
