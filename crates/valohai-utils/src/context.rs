//! Process state for a training script.
//!
//! Every input and parameter can be given in three places. Per name, the
//! first of these wins:
//!
//! 1. a command-line flag (`--name=value`)
//! 2. `inputs.json` / `parameters.json` in the config directory
//! 3. the default declared with [`Context::prepare`]
//!
//! Resolution happens once, on first access, and the result is cached until
//! [`Context::reset`] or the next `prepare`.

use crate::cli_args::{parse_overrides, FlagKind};
use crate::distributed::Distributed;
use crate::download::{DownloadType, Fetcher, HttpFetcher};
use crate::error::{ValohaiError, ValohaiResult};
use crate::execution::ExecutionConfig;
use crate::input_info::InputInfo;
use crate::inputs::Input;
use crate::outputs::Output;
use crate::parameters::{ParameterType, ParameterValue};
use crate::paths::{EnvSource, Paths, ProcessEnv};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A declared default, either bare or wrapped as `{"default": value, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDeclaredValue {
    Bare(Value),
    Wrapped { default: Value, extra: Map<String, Value> },
}

impl RawDeclaredValue {
    /// Any JSON object is a wrapper and must carry a `default` key.
    pub fn from_json(name: &str, value: Value) -> ValohaiResult<Self> {
        match value {
            Value::Object(mut map) => {
                let default = map
                    .remove("default")
                    .ok_or_else(|| ValohaiError::Config(format!("No default value defined for {name}")))?;
                Ok(Self::Wrapped { default, extra: map })
            }
            other => Ok(Self::Bare(other)),
        }
    }

    pub fn default_value(&self) -> &Value {
        match self {
            Self::Bare(value) | Self::Wrapped { default: value, .. } => value,
        }
    }

    pub fn into_default(self) -> Value {
        match self {
            Self::Bare(value) | Self::Wrapped { default: value, .. } => value,
        }
    }
}

/// Step declaration: name, default image and default inputs and parameters.
#[derive(Debug, Clone, Default)]
pub struct Prepare {
    step: String,
    image: Option<String>,
    parameters: Vec<(String, Value)>,
    inputs: Vec<(String, Value)>,
}

impl Prepare {
    pub fn new(step: impl Into<String>) -> Self {
        Self { step: step.into(), ..Self::default() }
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// A parameter default: a bool, number or string, optionally wrapped.
    pub fn parameter(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.parameters.push((name.into(), default.into()));
        self
    }

    /// An input default: one URL or path, a list of them, optionally wrapped.
    pub fn input(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.inputs.push((name.into(), default.into()));
        self
    }
}

#[derive(Debug, Clone)]
struct DeclaredInput {
    values: Vec<String>,
    plural: bool,
}

impl DeclaredInput {
    fn from_json(name: &str, value: &Value) -> ValohaiResult<Self> {
        let invalid = || ValohaiError::Config(format!("default for input {name} must be a string or a list of strings"));
        match value {
            Value::Null => Ok(Self { values: Vec::new(), plural: false }),
            Value::String(s) => Ok(Self { values: vec![s.clone()], plural: false }),
            Value::Array(items) => {
                let values = items.iter().map(|v| v.as_str().map(str::to_string).ok_or_else(invalid)).collect::<Result<_, _>>()?;
                Ok(Self { values, plural: true })
            }
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Default)]
struct ProcessState {
    loaded: bool,
    step_name: Option<String>,
    image: Option<String>,
    default_inputs: BTreeMap<String, DeclaredInput>,
    default_parameters: BTreeMap<String, ParameterValue>,
    /// Declared with a `null` default: known to the command line, but valueless.
    valueless_parameters: BTreeSet<String>,
    inputs: HashMap<String, InputInfo>,
    parameters: BTreeMap<String, ParameterValue>,
}

/// Resolved inputs, parameters and execution details of one process.
pub struct Context {
    paths: Paths,
    args: Vec<String>,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<ProcessState>,
    distributed: Distributed,
}

impl Context {
    /// `args` are the script's arguments without the program name.
    ///
    /// Downloads go over HTTP; datum references need [`Context::from_env`]
    /// credentials or a custom fetcher.
    pub fn new(paths: Paths, args: Vec<String>) -> ValohaiResult<Self> {
        let fetcher = HttpFetcher::new(paths.api_config_path(), None)?;
        Ok(Self::with_parts(paths, args, Arc::new(fetcher)))
    }

    /// Paths and datum credentials from the environment, overrides from `std::env::args`.
    pub fn from_env() -> ValohaiResult<Self> {
        Self::from_env_source(&ProcessEnv, std::env::args().skip(1).collect())
    }

    pub fn from_env_source(env: &dyn EnvSource, args: Vec<String>) -> ValohaiResult<Self> {
        let paths = Paths::from_env(env);
        let fetcher = HttpFetcher::from_env(env, &paths)?;
        Ok(Self::with_parts(paths, args, Arc::new(fetcher)))
    }

    fn with_parts(paths: Paths, args: Vec<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        let distributed = Distributed::new(paths.distributed_config_path());
        Self { paths, args, fetcher, state: Mutex::new(ProcessState::default()), distributed }
    }

    /// Replace how input files are fetched.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// Declare the step and its defaults, then resolve everything again.
    ///
    /// Nothing is downloaded here.
    pub fn prepare(&self, prepare: Prepare) -> ValohaiResult<()> {
        let mut default_parameters = BTreeMap::new();
        let mut valueless_parameters = BTreeSet::new();
        for (name, raw) in prepare.parameters {
            let value = RawDeclaredValue::from_json(&name, raw)?.into_default();
            if value.is_null() {
                valueless_parameters.insert(name);
            } else {
                let parsed = ParameterValue::from_json(&name, &value)?;
                default_parameters.insert(name, parsed);
            }
        }
        let mut default_inputs = BTreeMap::new();
        for (name, raw) in prepare.inputs {
            let value = RawDeclaredValue::from_json(&name, raw)?.into_default();
            default_inputs.insert(name.clone(), DeclaredInput::from_json(&name, &value)?);
        }

        let mut state = self.lock();
        *state = ProcessState {
            step_name: Some(prepare.step),
            image: prepare.image,
            default_inputs,
            default_parameters,
            valueless_parameters,
            ..ProcessState::default()
        };
        self.distributed.flush();
        self.load(&mut state)
    }

    /// Forget every declaration and resolved value.
    pub fn reset(&self) {
        *self.lock() = ProcessState::default();
        self.distributed.flush();
    }

    pub fn step_name(&self) -> Option<String> {
        self.lock().step_name.clone()
    }

    pub fn image(&self) -> Option<String> {
        self.lock().image.clone()
    }

    /// The resolved value, or `None` for an unknown name.
    pub fn parameter(&self, name: &str) -> ValohaiResult<Option<ParameterValue>> {
        let mut state = self.lock();
        self.load_if_necessary(&mut state)?;
        Ok(state.parameters.get(name).cloned())
    }

    /// The resolved value, falling back to `default` for an unknown name.
    pub fn parameter_or(&self, name: &str, default: impl Into<ParameterValue>) -> ValohaiResult<ParameterValue> {
        Ok(self.parameter(name)?.unwrap_or_else(|| default.into()))
    }

    /// Override a parameter for the rest of the process.
    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<ParameterValue>) -> ValohaiResult<()> {
        let mut state = self.lock();
        self.load_if_necessary(&mut state)?;
        state.parameters.insert(name.into(), value.into());
        Ok(())
    }

    pub fn parameters(&self) -> ValohaiResult<BTreeMap<String, ParameterValue>> {
        let mut state = self.lock();
        self.load_if_necessary(&mut state)?;
        Ok(state.parameters.clone())
    }

    pub fn input_names(&self) -> ValohaiResult<Vec<String>> {
        let mut state = self.lock();
        self.load_if_necessary(&mut state)?;
        let mut names: Vec<_> = state.inputs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn input(&self, name: impl Into<String>) -> Input<'_> {
        Input::new(self, name.into())
    }

    pub fn output(&self, name: impl Into<String>) -> Output {
        Output::new(&self.paths, name)
    }

    pub fn distributed(&self) -> &Distributed {
        &self.distributed
    }

    pub fn execution(&self) -> ValohaiResult<Option<ExecutionConfig>> {
        ExecutionConfig::load(&self.paths)
    }

    /// The cached files of input `name`, downloaded per `download_type`.
    ///
    /// Downloads update the cached entry, so later calls reuse them.
    pub(crate) fn resolve_input(&self, name: &str, download_type: DownloadType) -> ValohaiResult<Option<InputInfo>> {
        let mut state = self.lock();
        self.load_if_necessary(&mut state)?;
        let Some(info) = state.inputs.get_mut(name) else {
            return Ok(None);
        };
        info.download_if_necessary(&self.paths.input_dir(name), download_type, self.fetcher())?;
        Ok(Some(info.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_if_necessary(&self, state: &mut ProcessState) -> ValohaiResult<()> {
        if state.loaded { Ok(()) } else { self.load(state) }
    }

    fn load(&self, state: &mut ProcessState) -> ValohaiResult<()> {
        let config_inputs = read_config(&self.paths.inputs_config_path())?;
        let config_parameters = read_config(&self.paths.parameters_config_path())?;

        let mut inputs = HashMap::new();
        let mut flags = HashMap::new();
        for (name, declared) in &state.default_inputs {
            inputs.insert(name.clone(), InputInfo::from_urls_and_paths(&declared.values)?);
            flags.insert(name.clone(), FlagKind::Input { plural: declared.plural });
        }
        for (name, value) in &config_inputs {
            let info = InputInfo::from_json(name, value)?;
            let declared_plural = state.default_inputs.get(name).is_some_and(|d| d.plural);
            flags.insert(name.clone(), FlagKind::Input { plural: declared_plural || info.files.len() > 1 });
            inputs.insert(name.clone(), info);
        }

        let mut parameters = state.default_parameters.clone();
        let mut valueless = state.valueless_parameters.clone();
        for (name, value) in &config_parameters {
            if value.is_null() {
                parameters.remove(name);
                valueless.insert(name.clone());
                continue;
            }
            match ParameterValue::from_json(name, value) {
                Ok(parsed) => {
                    valueless.remove(name);
                    parameters.insert(name.clone(), parsed);
                }
                Err(e) => tracing::warn!(parameter = %name, error = %e, "ignoring unsupported parameter value in config"),
            }
        }
        for name in &valueless {
            flags.insert(name.clone(), FlagKind::Parameter(ParameterType::Str));
        }
        for (name, value) in &parameters {
            // The declared default fixes the type used to parse the flag.
            let ty = state.default_parameters.get(name).unwrap_or(value).parameter_type();
            flags.insert(name.clone(), FlagKind::Parameter(ty));
        }

        let overrides = parse_overrides(&self.args, &flags);
        for (name, values) in overrides.inputs {
            inputs.insert(name, InputInfo::from_urls_and_paths(&values)?);
        }
        parameters.extend(overrides.parameters);

        tracing::debug!(inputs = inputs.len(), parameters = parameters.len(), "resolved inputs and parameters");
        state.inputs = inputs;
        state.parameters = parameters;
        state.loaded = true;
        Ok(())
    }
}

/// The top-level object of a config file, or empty when the file is absent.
fn read_config(path: &Path) -> ValohaiResult<Map<String, Value>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(ValohaiError::Config(format!("{} must contain a JSON object", path.display()))),
    }
}
