//! Directory layout of an execution.
//!
//! Each base directory is taken from an explicit environment override first,
//! then the platform mount point when running under Valohai, then a
//! project-local `.valohai/` directory for local development.

use crate::error::{ValohaiError, ValohaiResult};
use chrono::Local;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

pub const CONFIG_DIR_VAR: &str = "VH_CONFIG_DIR";
pub const INPUTS_DIR_VAR: &str = "VH_INPUTS_DIR";
pub const OUTPUTS_DIR_VAR: &str = "VH_OUTPUTS_DIR";
pub const REPOSITORY_DIR_VAR: &str = "VH_REPOSITORY_DIR";
pub const JOB_ID_VAR: &str = "VH_JOB_ID";
pub const FLAT_LOCAL_OUTPUTS_VAR: &str = "VH_FLAT_LOCAL_OUTPUTS";

const PLATFORM_ROOT: &str = "/valohai";
const LOCAL_ROOT: &str = ".valohai";

/// Read access to environment variables.
pub trait EnvSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment. Empty values count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).filter(|v| !v.is_empty()).cloned()
    }
}

pub fn is_running_in_valohai(env: &dyn EnvSource) -> bool {
    env.get(JOB_ID_VAR).is_some()
}

/// Process-wide id for this run, `%Y%m%d-%H%M%S-<6 hex>`.
pub fn execution_guid() -> &'static str {
    static GUID: OnceLock<String> = OnceLock::new();
    GUID.get_or_init(|| {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", Local::now().format("%Y%m%d-%H%M%S"), &suffix[..6])
    })
}

/// Resolved base directories plus the files and subdirectories derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    config_dir: PathBuf,
    inputs_dir: PathBuf,
    outputs_dir: PathBuf,
    repository_dir: PathBuf,
}

impl Paths {
    pub fn new(config_dir: PathBuf, inputs_dir: PathBuf, outputs_dir: PathBuf, repository_dir: PathBuf) -> Self {
        Self { config_dir, inputs_dir, outputs_dir, repository_dir }
    }

    /// `config/`, `inputs/`, `outputs/` and `repository/` below one root.
    pub fn rooted_at(root: &Path) -> Self {
        Self::new(root.join("config"), root.join("inputs"), root.join("outputs"), root.join("repository"))
    }

    pub fn from_env(env: &dyn EnvSource) -> Self {
        let on_platform = is_running_in_valohai(env);
        let pick = |var: &str, platform: &str, local: PathBuf| -> PathBuf {
            env.get(var).map_or_else(
                || if on_platform { Path::new(PLATFORM_ROOT).join(platform) } else { local },
                PathBuf::from,
            )
        };

        let local_outputs = if env.get(FLAT_LOCAL_OUTPUTS_VAR).is_some() {
            Path::new(LOCAL_ROOT).join("outputs")
        } else {
            Path::new(LOCAL_ROOT).join("outputs").join(execution_guid())
        };

        let paths = Self {
            config_dir: pick(CONFIG_DIR_VAR, "config", Path::new(LOCAL_ROOT).join("config")),
            inputs_dir: pick(INPUTS_DIR_VAR, "inputs", Path::new(LOCAL_ROOT).join("inputs")),
            outputs_dir: pick(OUTPUTS_DIR_VAR, "outputs", local_outputs),
            repository_dir: pick(REPOSITORY_DIR_VAR, "repository", PathBuf::from(".")),
        };
        tracing::debug!(?paths, on_platform, "resolved execution paths");
        paths
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn inputs_dir(&self) -> &Path {
        &self.inputs_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    pub fn repository_dir(&self) -> &Path {
        &self.repository_dir
    }

    /// Download directory of one input.
    pub fn input_dir(&self, name: &str) -> PathBuf {
        self.inputs_dir.join(name)
    }

    /// Directory of a named output group; the empty name is the outputs root.
    pub fn output_dir(&self, name: &str) -> PathBuf {
        if name.is_empty() { self.outputs_dir.clone() } else { self.outputs_dir.join(name) }
    }

    pub fn inputs_config_path(&self) -> PathBuf {
        self.config_dir.join("inputs.json")
    }

    pub fn parameters_config_path(&self) -> PathBuf {
        self.config_dir.join("parameters.json")
    }

    pub fn execution_config_path(&self) -> PathBuf {
        self.config_dir.join("execution.json")
    }

    pub fn api_config_path(&self) -> PathBuf {
        self.config_dir.join("api.json")
    }

    pub fn distributed_config_path(&self) -> PathBuf {
        self.config_dir.join("distributed.json")
    }

    /// Place `fragment` inside the output directory `name`.
    ///
    /// An absolute fragment that already points inside the outputs root is
    /// taken relative to that root. Anything that would land outside it is a
    /// configuration error.
    pub fn output_path(&self, name: &str, fragment: &str) -> ValohaiResult<PathBuf> {
        let fragment_path = Path::new(fragment);
        if fragment_path.is_absolute() {
            let root = std::path::absolute(&self.outputs_dir)?;
            let relative = fragment_path.strip_prefix(&root).map_err(|_| {
                ValohaiError::Config(format!(
                    "output path {} is outside the outputs directory {}",
                    fragment_path.display(),
                    root.display()
                ))
            })?;
            return Ok(self.outputs_dir.join(checked_relative(relative)?));
        }
        Ok(self.output_dir(name).join(checked_relative(fragment_path)?))
    }
}

fn checked_relative(path: &Path) -> ValohaiResult<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(ValohaiError::Config(format!(
                    "output path {} escapes the outputs directory",
                    path.display()
                )));
            }
        }
    }
    Ok(out)
}
