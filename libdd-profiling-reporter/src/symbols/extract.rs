// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ExtractError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Produces a debug-information-only image of an executable.
#[async_trait]
pub trait DebugInfoExtractor: Send + Sync {
    /// Reads `source` and writes the stripped image to `destination`, which
    /// already exists and is empty.
    async fn only_keep_debug(&self, source: &Path, destination: &Path)
        -> Result<(), ExtractError>;
}

/// Shells out to binutils' `objcopy --only-keep-debug`.
#[derive(Clone, Debug)]
pub struct ObjcopyExtractor {
    program: String,
}

impl Default for ObjcopyExtractor {
    fn default() -> Self {
        Self::new("objcopy")
    }
}

impl ObjcopyExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DebugInfoExtractor for ObjcopyExtractor {
    async fn only_keep_debug(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(), ExtractError> {
        let output = Command::new(&self.program)
            .arg("--only-keep-debug")
            .arg(source)
            .arg(destination)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ExtractError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
