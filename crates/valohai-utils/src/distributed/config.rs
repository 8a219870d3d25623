use super::member::{Member, RawMember};
use super::ranking::compute_member_id_ranks;
use crate::error::ValohaiResult;
use serde::Deserialize;
use std::path::Path;

/// Snapshot of a distributed job group, with members ranked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributedConfig {
    pub group_name: String,
    pub member_id: String,
    pub required_count: u32,
    pub members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    config: RawGroup,
    members: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    group_name: String,
    member_id: String,
    required_count: u32,
}

impl DistributedConfig {
    pub fn from_json_str(json: &str) -> ValohaiResult<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let ids: Vec<&str> = raw.members.iter().map(|m| m.member_id.as_str()).collect();
        let ranks = compute_member_id_ranks(&ids);
        let members = raw
            .members
            .into_iter()
            .map(|m| {
                let rank = ranks.get(&m.member_id).copied().unwrap_or_default();
                m.into_member(rank)
            })
            .collect();

        Ok(Self {
            group_name: raw.config.group_name,
            member_id: raw.config.member_id,
            required_count: raw.config.required_count,
            members,
        })
    }

    pub fn from_path(path: &Path) -> ValohaiResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}
