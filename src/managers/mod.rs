pub mod backup;
pub mod logging;
pub mod remote;
pub mod restore;
pub mod upload;
