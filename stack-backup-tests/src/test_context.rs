//! Scratch directory for laying out base, backup and restore trees
//!
//! Paths passed to the helpers are relative to the scratch root, e.g.
//! `ctx.create_file("base/app/data/settings.json", "{}")`.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

pub struct TestContext {
    root: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("Failed to create scratch directory"),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        self.root.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn create_subdir(&self, relative: &str) -> PathBuf {
        let dir = self.path(relative);
        fs::create_dir_all(&dir).expect("Failed to create directory");
        dir
    }

    /// Write a file, creating missing parents
    pub fn create_file(&self, relative: &str, content: &str) -> PathBuf {
        let file = self.path(relative);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file, content).expect("Failed to write file");
        file
    }

    /// Write a file and backdate (or postdate) its modification time
    pub fn create_file_modified_at(&self, relative: &str, content: &str, modified: SystemTime) -> PathBuf {
        let file = self.create_file(relative, content);
        fs::File::options()
            .write(true)
            .open(&file)
            .and_then(|f| f.set_modified(modified))
            .expect("Failed to set modification time");
        file
    }

    pub fn file_exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    pub fn read_file(&self, relative: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path(relative))?)
    }

    /// Sorted names of the regular files directly inside `dir`; empty when
    /// `dir` does not exist
    pub fn list_files(&self, dir: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.path(dir)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Assertion helpers for results returned by the library
pub trait ResultAssertions<T> {
    fn assert_ok(self) -> T;

    /// Assert failure and that the debug rendering (full context chain)
    /// mentions `needle`
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Debug> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        self.unwrap_or_else(|e| panic!("Expected Ok, got Err: {:?}", e))
    }

    fn assert_err_contains(self, needle: &str) {
        let rendered = match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => format!("{:?}", e),
        };
        assert!(
            rendered.contains(needle),
            "Error '{}' does not mention '{}'",
            rendered,
            needle
        );
    }
}
