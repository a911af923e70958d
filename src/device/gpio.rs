use std::path::{Path, PathBuf};

use super::Output;
use crate::error::OutputError;

/// Output driven through a sysfs GPIO `value` file. The pin must already be
/// exported and configured as an output.
pub struct SysfsGpio {
    value: PathBuf,
}

impl SysfsGpio {
    pub fn new(value: &Path) -> Self {
        Self {
            value: value.to_path_buf(),
        }
    }
}

impl Output for SysfsGpio {
    async fn set(&mut self, on: bool) -> Result<(), OutputError> {
        tokio::fs::write(&self.value, if on { "1" } else { "0" }).await?;
        Ok(())
    }

    async fn get(&mut self) -> Result<bool, OutputError> {
        let raw = tokio::fs::read_to_string(&self.value).await?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(OutputError::Parse(other.to_string())),
        }
    }
}
