//! Execution command implementation.

use colored::Colorize;
use valohai_utils::{ExecutionConfig, Paths, ProcessEnv};

pub fn execute() -> anyhow::Result<()> {
    let paths = Paths::from_env(&ProcessEnv);
    match ExecutionConfig::load(&paths)? {
        Some(config) => super::print_json(&serde_json::to_value(config)?),
        None => {
            println!("{}", "not running under Valohai".yellow());
            Ok(())
        }
    }
}
