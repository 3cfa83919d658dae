// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{
    iface::DEFAULT_MTU, route::AddressFamily, ErrorKind, NetstateError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum SwitchType {
    LinuxBridge,
    Ovs,
}

impl Default for SwitchType {
    fn default() -> Self {
        Self::LinuxBridge
    }
}

/// One legacy network entry using the original flat key names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct NetworkAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    #[serde(default)]
    pub bridged: bool,
    #[serde(default)]
    pub stp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipaddr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootproto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6addr: Option<String>,
    #[serde(default)]
    pub dhcpv6: bool,
    #[serde(default)]
    pub ipv6autoconf: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, rename = "defaultRoute")]
    pub default_route: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Vec<String>>,
    #[serde(default)]
    pub remove: bool,
    #[serde(default)]
    pub switch: SwitchType,
}

/// One legacy bonding entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct BondAttributes {
    #[serde(default)]
    pub nics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hwaddr: Option<String>,
    #[serde(default)]
    pub remove: bool,
    #[serde(default)]
    pub switch: SwitchType,
}

const BOOTPROTO_DHCP: &str = "dhcp";

/// Normalized view of one legacy network entry.
///
/// Built fresh from the legacy attributes on every call and never
/// mutated afterwards. The absence of a previously running entry is an
/// explicit `Option<&NetworkConfig>` at every consumer, a removal
/// request keeps its (mostly empty) attributes here and reads the
/// running entry for device facts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct NetworkConfig {
    pub name: String,
    pub nic: Option<String>,
    pub bond: Option<String>,
    pub vlan: Option<u16>,
    pub bridged: bool,
    pub stp: bool,
    pub mtu: u64,
    pub ipv4_addr: Option<String>,
    pub ipv4_netmask: Option<String>,
    pub dhcpv4: bool,
    pub ipv6_addr: Option<String>,
    pub dhcpv6: bool,
    pub ipv6_autoconf: bool,
    pub ipv6_gateway: Option<String>,
    pub ipv4_gateway: Option<String>,
    pub default_route: bool,
    pub nameservers: Vec<String>,
    pub remove: bool,
    pub switch: SwitchType,
}

impl NetworkConfig {
    pub fn new(
        name: &str,
        attrs: &NetworkAttributes,
    ) -> Result<Self, NetstateError> {
        if !attrs.remove && attrs.nic.is_none() && attrs.bonding.is_none() {
            return Err(NetstateError::new(
                ErrorKind::InvalidArgument,
                format!("Network {name} has neither a nic nor a bonding"),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            nic: non_empty(attrs.nic.as_deref()),
            bond: non_empty(attrs.bonding.as_deref()),
            vlan: attrs.vlan,
            bridged: attrs.bridged,
            stp: attrs.stp,
            mtu: attrs.mtu.unwrap_or(DEFAULT_MTU),
            ipv4_addr: non_empty(attrs.ipaddr.as_deref()),
            ipv4_netmask: non_empty(attrs.netmask.as_deref()),
            dhcpv4: attrs.bootproto.as_deref() == Some(BOOTPROTO_DHCP),
            ipv6_addr: non_empty(attrs.ipv6addr.as_deref()),
            dhcpv6: attrs.dhcpv6,
            ipv6_autoconf: attrs.ipv6autoconf,
            ipv6_gateway: non_empty(attrs.ipv6gateway.as_deref()),
            ipv4_gateway: non_empty(attrs.gateway.as_deref()),
            default_route: attrs.default_route,
            nameservers: attrs.nameservers.clone().unwrap_or_default(),
            remove: attrs.remove,
            switch: attrs.switch,
        })
    }

    /// The carrier device beneath this network: the bond when one is
    /// configured, the nic otherwise.
    pub fn base_iface(&self) -> Option<&str> {
        self.bond.as_deref().or(self.nic.as_deref())
    }

    pub fn vlan_iface(&self) -> Option<String> {
        match (self.base_iface(), self.vlan) {
            (Some(base), Some(tag)) => Some(format!("{base}.{tag}")),
            _ => None,
        }
    }

    /// The interface routes of this network point at: the network-named
    /// interface for OVS and bridged networks, the VLAN or carrier
    /// device otherwise.
    pub fn next_hop_iface(&self) -> Option<String> {
        if self.switch == SwitchType::Ovs || self.bridged {
            Some(self.name.clone())
        } else {
            self.vlan_iface()
                .or_else(|| self.base_iface().map(str::to_string))
        }
    }

    pub fn is_static_ipv4(&self) -> bool {
        self.ipv4_addr.is_some()
    }

    pub(crate) fn gateway(&self, family: AddressFamily) -> Option<&str> {
        match family {
            AddressFamily::IPv4 => self.ipv4_gateway.as_deref(),
            AddressFamily::IPv6 => self.ipv6_gateway.as_deref(),
        }
    }

    pub(crate) fn is_dynamic(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::IPv4 => self.dhcpv4,
            AddressFamily::IPv6 => self.dhcpv6 || self.ipv6_autoconf,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
