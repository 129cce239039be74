// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Test helpers for building throwaway module workspaces on disk.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a list of `(relative path, contents)` pairs under `root`, creating
/// parent directories as needed.
pub fn write_files(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (rel_path, contents) in files {
        let path = root.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
    }
    Ok(())
}

/// A temporary on-disk workspace of framework modules.
///
/// The workspace root is a module directory itself; child modules live in
/// subdirectories. The directory is deleted when the fixture is dropped.
pub struct FixtureWorkspace {
    dir: TempDir,
}

impl FixtureWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a module descriptor at `<rel_dir>/weaver.xml`. Pass "" for the
    /// workspace root module.
    pub fn add_module(&self, rel_dir: &str, descriptor_xml: &str) -> Result<&Self> {
        let dir = self.module_dir(rel_dir);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("weaver.xml"), descriptor_xml)?;
        Ok(self)
    }

    /// Writes a Java source file under `<rel_dir>/src/main/java/<class_path>`.
    pub fn add_source(&self, rel_dir: &str, class_path: &str, text: &str) -> Result<&Self> {
        let path = self
            .module_dir(rel_dir)
            .join("src/main/java")
            .join(class_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, text)?;
        Ok(self)
    }

    /// Writes an arbitrary file relative to the workspace root, e.g. an
    /// artifact-cache entry.
    pub fn add_file(&self, rel_path: &str, contents: &str) -> Result<&Self> {
        write_files(self.root(), &[(rel_path, contents)])?;
        Ok(self)
    }

    fn module_dir(&self, rel_dir: &str) -> PathBuf {
        if rel_dir.is_empty() {
            self.root().to_owned()
        } else {
            self.root().join(rel_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_module_layout() -> Result<()> {
        let ws = FixtureWorkspace::new()?;
        ws.add_module("", "<module/>")?;
        ws.add_module("ui", "<module/>")?;
        ws.add_source("ui", "com/ex/ui/Widget.java", "package com.ex.ui;")?;

        assert!(ws.root().join("weaver.xml").exists());
        assert!(ws.root().join("ui/weaver.xml").exists());
        assert!(ws
            .root()
            .join("ui/src/main/java/com/ex/ui/Widget.java")
            .exists());
        Ok(())
    }
}
