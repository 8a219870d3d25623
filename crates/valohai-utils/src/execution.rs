use crate::error::ValohaiResult;
use crate::paths::Paths;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

/// Information about the current execution, from `execution.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(rename = "valohai.execution-counter", default)]
    pub counter: Option<u64>,
    #[serde(rename = "valohai.execution-id", default)]
    pub id: Option<String>,
    #[serde(rename = "valohai.execution-title", default)]
    pub title: Option<String>,
}

impl ExecutionConfig {
    /// `None` when not running under Valohai. A malformed file is an error.
    pub fn load(paths: &Paths) -> ValohaiResult<Option<Self>> {
        Self::from_path(&paths.execution_config_path())
    }

    pub fn from_path(path: &Path) -> ValohaiResult<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
