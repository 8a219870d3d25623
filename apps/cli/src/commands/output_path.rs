//! Output path command implementation.

use valohai_utils::{Output, Paths, ProcessEnv};

pub fn execute(fragment: &str, output: &str) -> anyhow::Result<()> {
    let paths = Paths::from_env(&ProcessEnv);
    let path = Output::new(&paths, output).path(fragment)?;
    println!("{}", path.display());
    Ok(())
}
