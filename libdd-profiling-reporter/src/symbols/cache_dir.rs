// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The directory holding extracted debug info between attempts.
//!
//! Extracted files can't be checked for freshness cheaply, so none of them
//! survives a restart.

use crate::error::ReporterError;
use std::fs;
use std::path::Path;

/// Creates `directory` if needed and deletes every file directly inside it.
///
/// Uses blocking `std::fs` calls. It runs once while the reporter starts, on
/// whichever thread calls [`crate::Reporter::start`], and never on the upload
/// path.
pub fn prepare(directory: &Path) -> Result<(), ReporterError> {
    let wrap = |source| ReporterError::CacheDirectory {
        path: directory.to_path_buf(),
        source,
    };
    if !directory.exists() {
        tracing::debug!(path = %directory.display(), "Creating cache directory");
        fs::create_dir_all(directory).map_err(wrap)?;
    }
    for entry in fs::read_dir(directory).map_err(wrap)? {
        let path = entry.map_err(wrap)?.path();
        if path.is_dir() {
            continue;
        }
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), "Failed to remove cached file: {e}");
        }
    }
    Ok(())
}
