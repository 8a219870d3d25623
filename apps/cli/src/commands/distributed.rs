//! Distributed command implementation.

use serde_json::json;
use valohai_utils::{Paths, ProcessEnv};

pub fn execute(probe: bool) -> anyhow::Result<()> {
    let paths = Paths::from_env(&ProcessEnv);
    let distributed = valohai_utils::Distributed::new(paths.distributed_config_path());

    if probe {
        println!("{}", distributed.is_distributed_task());
        return Ok(());
    }

    let master = distributed.master()?;
    super::print_json(&json!({
        "group_name": distributed.group_name()?,
        "member_id": distributed.member_id()?,
        "rank": distributed.rank()?,
        "required_count": distributed.required_count()?,
        "is_master": distributed.me()?.is_master(),
        "master": {
            "member_id": &master.member_id,
            "local_ip": master.primary_local_ip().ok(),
            "public_ip": master.primary_public_ip().ok(),
        },
        "members": distributed.members()?,
    }))
}
