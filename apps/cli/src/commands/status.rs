//! Status command implementation.

use valohai_utils::{ApiClient, Paths, ProcessEnv};

/// Set the status detail. A missing API config is a silent no-op.
pub fn execute(detail: &str) -> anyhow::Result<()> {
    let paths = Paths::from_env(&ProcessEnv);
    ApiClient::new(paths.api_config_path())?.set_status_detail(detail);
    Ok(())
}
