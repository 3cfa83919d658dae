// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    DnsResolverState, Interface, NetstateError, RouteRules, Routes,
};

/// OVS external-IDs key carrying the OVN bridge mapping string.
pub const OVN_BRIDGE_MAPPINGS_KEY: &str = "ovn-bridge-mappings";

/// The top-level network state document, both as produced for the
/// state applier and as reported back by it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct NetworkState {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Routes>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "route-rules")]
    pub rules: Option<RouteRules>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "dns-resolver")]
    pub dns: Option<DnsResolverState>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "ovs-db")]
    pub ovsdb: Option<OvsDbGlobalConfig>,
}

impl NetworkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String, NetstateError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Global OVS database section. The manager stores the OVN bridge
/// mapping as a plain `external_ids` entry; an explicitly empty string
/// is a valid value distinct from the key being absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct OvsDbGlobalConfig {
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
}

impl OvsDbGlobalConfig {
    pub(crate) fn with_bridge_mappings(mappings: String) -> Self {
        let mut external_ids = BTreeMap::new();
        external_ids.insert(OVN_BRIDGE_MAPPINGS_KEY.to_string(), mappings);
        Self { external_ids }
    }
}
