// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{InterfaceIpv4, InterfaceIpv6};

pub(crate) const DEFAULT_MTU: u64 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum InterfaceType {
    Bond,
    Ethernet,
    LinuxBridge,
    OvsBridge,
    OvsInterface,
    Vlan,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                InterfaceType::Bond => "bond",
                InterfaceType::Ethernet => "ethernet",
                InterfaceType::LinuxBridge => "linux-bridge",
                InterfaceType::OvsBridge => "ovs-bridge",
                InterfaceType::OvsInterface => "ovs-interface",
                InterfaceType::Vlan => "vlan",
                InterfaceType::Unknown => "unknown",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum InterfaceState {
    Up,
    Down,
    Absent,
    #[serde(other)]
    Unknown,
}

/// Desired or reported state of a single network interface.
///
/// Unlike the full manager schema this carries only the properties the
/// translation layer reads or writes; unknown keys in a reported state
/// are ignored on deserialization. A fragment with most fields unset is
/// a valid "mentioned but unchanged" entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct Interface {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub iface_type: Option<InterfaceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<InterfaceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Serialize and deserialize to/from `mac-address`.
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<InterfaceIpv4>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<InterfaceIpv6>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<VlanConfig>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "link-aggregation"
    )]
    pub bond: Option<BondConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Bridge configuration, used both for Linux bridges and OVS bridges.
    pub bridge: Option<BridgeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<EthernetConfig>,
}

impl Interface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn new_up(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Some(InterfaceState::Up),
            ..Default::default()
        }
    }

    pub(crate) fn new_absent(name: &str, iface_type: InterfaceType) -> Self {
        Self {
            name: name.to_string(),
            iface_type: Some(iface_type),
            state: Some(InterfaceState::Absent),
            ..Default::default()
        }
    }

    pub fn is_absent(&self) -> bool {
        self.state == Some(InterfaceState::Absent)
    }

    pub fn is_up(&self) -> bool {
        self.state == Some(InterfaceState::Up)
    }

    pub(crate) fn has_ip_config(&self) -> bool {
        self.ipv4.is_some() || self.ipv6.is_some()
    }

    /// Union with another fragment for the same device: fields already
    /// set win, except MTU where the larger request wins. Used when
    /// several networks share one southbound device.
    pub(crate) fn union_with(&mut self, other: Interface) {
        self.mtu = match (self.mtu, other.mtu) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if self.iface_type.is_none() {
            self.iface_type = other.iface_type;
        }
        if self.state.is_none() {
            self.state = other.state;
        }
        if self.mac_address.is_none() {
            self.mac_address = other.mac_address;
        }
        if self.ipv4.is_none() {
            self.ipv4 = other.ipv4;
        }
        if self.ipv6.is_none() {
            self.ipv6 = other.ipv6;
        }
        if self.vlan.is_none() {
            self.vlan = other.vlan;
        }
        if self.bond.is_none() {
            self.bond = other.bond;
        }
        if self.bridge.is_none() {
            self.bridge = other.bridge;
        }
        if self.ethernet.is_none() {
            self.ethernet = other.ethernet;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct VlanConfig {
    pub base_iface: String,
    pub id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct BondConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Free-form bonding options. The manager reports mixed value
    /// types here, so the values stay JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct BridgeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<BridgeOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<Vec<BridgePortConfig>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct BridgeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stp: Option<BridgeStpOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct BridgeStpOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct BridgePortConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<BridgePortVlanConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct BridgePortVlanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BridgePortVlanMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum BridgePortVlanMode {
    Access,
    Trunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct EthernetConfig {
    #[serde(skip_serializing_if = "Option::is_none", rename = "sr-iov")]
    pub sr_iov: Option<SrIovConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct SrIovConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_vfs: Option<u32>,
}
