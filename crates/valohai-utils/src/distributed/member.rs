use crate::error::{ValohaiError, ValohaiResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One worker of a distributed job group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub member_id: String,
    pub identity: String,
    pub job_id: String,
    pub announce_time: String,
    pub exposed_ports: BTreeMap<String, String>,
    pub local_ips: Vec<String>,
    pub public_ips: Vec<String>,
    pub rank: usize,
}

impl Member {
    pub fn is_master(&self) -> bool {
        self.rank == 0
    }

    pub fn primary_local_ip(&self) -> ValohaiResult<&str> {
        self.local_ips.first().map(String::as_str).ok_or_else(|| {
            ValohaiError::Distributed("There are no local IPs in the distributed worker network configuration".into())
        })
    }

    pub fn primary_public_ip(&self) -> ValohaiResult<&str> {
        self.public_ips.first().map(String::as_str).ok_or_else(|| {
            ValohaiError::Distributed("There are no public IPs in the distributed worker network configuration".into())
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMember {
    pub(crate) announce_time: String,
    pub(crate) identity: String,
    pub(crate) job_id: String,
    pub(crate) member_id: String,
    pub(crate) network: RawNetwork,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawNetwork {
    pub(crate) exposed_ports: BTreeMap<String, String>,
    pub(crate) local_ips: Vec<String>,
    pub(crate) public_ips: Vec<String>,
}

impl RawMember {
    pub(crate) fn into_member(self, rank: usize) -> Member {
        Member {
            member_id: self.member_id,
            identity: self.identity,
            job_id: self.job_id,
            announce_time: self.announce_time,
            exposed_ports: self.network.exposed_ports,
            local_ips: self.network.local_ips,
            public_ips: self.network.public_ips,
            rank,
        }
    }
}
