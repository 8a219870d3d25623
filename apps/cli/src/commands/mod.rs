//! Command implementations for the Valohai Utils CLI.

pub mod distributed;
pub mod execution;
pub mod inputs;
pub mod metadata;
pub mod output_path;
pub mod parameters;
pub mod status;

use valohai_utils::{Context, ProcessEnv};

/// The process context as a script started with `overrides` would see it.
pub(crate) fn context(overrides: Vec<String>) -> anyhow::Result<Context> {
    Ok(Context::from_env_source(&ProcessEnv, overrides)?)
}

pub(crate) fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
