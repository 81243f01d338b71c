//! Unit tests for stack-backup building blocks

mod archive;
mod discover;
mod integrations;
mod retention;
