//! Node configuration (ambient): the TOML-deserialized settings that
//! parameterize a node's control plane. TLS, RPC listen addresses, and
//! storage backends are external collaborators' concerns; this only
//! covers the knobs the control plane itself reads.

use beacon_core::BeaconError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub address: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_dkg_timeout_secs")]
    pub dkg_timeout_secs: u64,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_catchup_period_secs")]
    pub catchup_period_secs: u64,
    #[serde(default = "default_max_wait_prepare_secs")]
    pub max_wait_prepare_secs: u64,
    #[serde(default = "default_push_grace_secs")]
    pub push_grace_secs: u64,
    #[serde(default = "default_call_max_timeout_secs")]
    pub call_max_timeout_secs: u64,
    #[serde(default)]
    pub scheme: u16,
}

fn default_dkg_timeout_secs() -> u64 {
    // `DefaultDKGTimeout`, §5.
    60
}

fn default_period_secs() -> u64 {
    // `DefaultPeriod`, §3: the beacon's own round cadence, independent of
    // the DKG protocol timeout.
    30
}

fn default_catchup_period_secs() -> u64 {
    10
}

fn default_max_wait_prepare_secs() -> u64 {
    // `MaxWaitPrepareDKG`, §5.
    60
}

fn default_push_grace_secs() -> u64 {
    60
}

fn default_call_max_timeout_secs() -> u64 {
    5
}

impl NodeConfig {
    pub fn from_toml(text: &str) -> Result<Self, BeaconError> {
        toml::from_str(text).map_err(|err| BeaconError::invalid(format!("invalid node config: {err}")))
    }

    pub fn dkg_timeout(&self) -> Duration {
        Duration::from_secs(self.dkg_timeout_secs)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn catchup_period(&self) -> Duration {
        Duration::from_secs(self.catchup_period_secs)
    }

    pub fn max_wait_prepare(&self) -> Duration {
        Duration::from_secs(self.max_wait_prepare_secs)
    }

    pub fn push_grace(&self) -> Duration {
        Duration::from_secs(self.push_grace_secs)
    }

    pub fn call_max_timeout(&self) -> Duration {
        Duration::from_secs(self.call_max_timeout_secs)
    }
}
