//! Distributed job groups.
//!
//! Workers of a distributed execution receive a static description of the
//! whole group. It is read on first use and cached until flushed.

mod config;
mod member;
mod ranking;

pub use config::DistributedConfig;
pub use member::Member;
pub use ranking::compute_member_id_ranks;

use crate::error::{ValohaiError, ValohaiResult};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub struct Distributed {
    config_path: PathBuf,
    config: Mutex<Option<Arc<DistributedConfig>>>,
}

impl Distributed {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path, config: Mutex::new(None) }
    }

    /// The group snapshot, loading it on first access.
    pub fn config(&self) -> ValohaiResult<Arc<DistributedConfig>> {
        let mut cached = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(config) = cached.as_ref() {
            return Ok(Arc::clone(config));
        }
        let config = Arc::new(DistributedConfig::from_path(&self.config_path)?);
        tracing::debug!(group = %config.group_name, members = config.members.len(), "loaded distributed config");
        *cached = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Whether this execution is part of a distributed group.
    ///
    /// A missing or malformed config means "no"; other failures are warned about.
    pub fn is_distributed_task(&self) -> bool {
        match self.config() {
            Ok(config) => !config.group_name.is_empty(),
            Err(e) if e.is_absent_or_malformed() => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse distributed config");
                false
            }
        }
    }

    pub fn group_name(&self) -> ValohaiResult<String> {
        Ok(self.config()?.group_name.clone())
    }

    pub fn member_id(&self) -> ValohaiResult<String> {
        Ok(self.config()?.member_id.clone())
    }

    pub fn required_count(&self) -> ValohaiResult<u32> {
        Ok(self.config()?.required_count)
    }

    pub fn rank(&self) -> ValohaiResult<usize> {
        Ok(self.me()?.rank)
    }

    pub fn members(&self) -> ValohaiResult<Vec<Member>> {
        Ok(self.config()?.members.clone())
    }

    pub fn member(&self, member_id: &str) -> ValohaiResult<Member> {
        self.config()?
            .members
            .iter()
            .find(|m| m.member_id == member_id)
            .cloned()
            .ok_or_else(|| ValohaiError::Distributed(format!("No member with id {member_id}")))
    }

    /// This worker. Its id must be among the members.
    pub fn me(&self) -> ValohaiResult<Member> {
        let config = self.config()?;
        self.member(&config.member_id)
    }

    pub fn master(&self) -> ValohaiResult<Member> {
        self.config()?
            .members
            .iter()
            .find(|m| m.is_master())
            .cloned()
            .ok_or_else(|| ValohaiError::Distributed("No master member found".into()))
    }

    /// Forget the cached snapshot; the next access reads the file again.
    pub fn flush(&self) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
