// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::{
    route::{generate_table_id, RouteEntry},
    ErrorKind, NetstateError, NetworkConfig,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct InterfaceIpAddr {
    pub ip: String,
    pub prefix_length: u8,
}

impl InterfaceIpAddr {
    pub fn new(ip: String, prefix_length: u8) -> Self {
        Self { ip, prefix_length }
    }
}

/// IPv4 family state of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct InterfaceIpv4 {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "address")]
    pub addresses: Option<Vec<InterfaceIpAddr>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "auto-dns")]
    pub auto_dns: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "auto-gateway")]
    pub auto_gateway: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "auto-routes")]
    pub auto_routes: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "auto-route-table-id"
    )]
    pub auto_table_id: Option<u32>,
}

impl InterfaceIpv4 {
    /// Family explicitly disabled; all addresses will be removed.
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// IPv6 family state of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct InterfaceIpv6 {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoconf: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "address")]
    pub addresses: Option<Vec<InterfaceIpAddr>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "auto-dns")]
    pub auto_dns: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "auto-gateway")]
    pub auto_gateway: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "auto-routes")]
    pub auto_routes: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "auto-route-table-id"
    )]
    pub auto_table_id: Option<u32>,
}

impl InterfaceIpv6 {
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Computes the desired address-family state of one network's IP-holding
/// interface from its legacy configuration.
pub(crate) struct IpAddress<'a> {
    net: &'a NetworkConfig,
    auto_dns: bool,
}

impl<'a> IpAddress<'a> {
    pub(crate) fn new(net: &'a NetworkConfig, auto_dns: bool) -> Self {
        Self { net, auto_dns }
    }

    pub(crate) fn ipv4_state(&self) -> Result<InterfaceIpv4, NetstateError> {
        if let Some(addr) = self.net.ipv4_addr.as_deref() {
            let netmask = self.net.ipv4_netmask.as_deref().ok_or_else(|| {
                NetstateError::new(
                    ErrorKind::InvalidArgument,
                    format!(
                        "Network {} has a static IPv4 address but no netmask",
                        self.net.name
                    ),
                )
            })?;
            Ok(InterfaceIpv4 {
                enabled: true,
                dhcp: Some(false),
                addresses: Some(vec![InterfaceIpAddr::new(
                    addr.to_string(),
                    prefix_from_netmask(netmask)?,
                )]),
                ..Default::default()
            })
        } else if self.net.dhcpv4 {
            Ok(InterfaceIpv4 {
                enabled: true,
                dhcp: Some(true),
                auto_dns: Some(self.auto_dns),
                auto_gateway: Some(true),
                auto_routes: Some(true),
                auto_table_id: Some(self.auto_table_id()),
                ..Default::default()
            })
        } else {
            Ok(InterfaceIpv4::disabled())
        }
    }

    pub(crate) fn ipv6_state(&self) -> Result<InterfaceIpv6, NetstateError> {
        if let Some(addr) = self.net.ipv6_addr.as_deref() {
            Ok(InterfaceIpv6 {
                enabled: true,
                dhcp: Some(false),
                autoconf: Some(false),
                addresses: Some(vec![parse_cidr_address(addr)?]),
                ..Default::default()
            })
        } else if self.net.dhcpv6 || self.net.ipv6_autoconf {
            Ok(InterfaceIpv6 {
                enabled: true,
                dhcp: Some(self.net.dhcpv6),
                autoconf: Some(self.net.ipv6_autoconf),
                auto_dns: Some(self.auto_dns),
                auto_gateway: Some(true),
                auto_routes: Some(true),
                auto_table_id: Some(self.auto_table_id()),
                ..Default::default()
            })
        } else {
            Ok(InterfaceIpv6::disabled())
        }
    }

    // Routes learned dynamically land in the main table only for the
    // default route network; other networks keep them in a per-interface
    // table so they cannot hijack the host default route.
    fn auto_table_id(&self) -> u32 {
        if self.net.default_route {
            RouteEntry::USE_DEFAULT_ROUTE_TABLE
        } else {
            self.net
                .next_hop_iface()
                .map(|iface| generate_table_id(&iface))
                .unwrap_or(RouteEntry::USE_DEFAULT_ROUTE_TABLE)
        }
    }
}

/// Converts a legacy dotted-quad netmask into a prefix length by
/// counting the set bits of every octet.
pub(crate) fn prefix_from_netmask(netmask: &str) -> Result<u8, NetstateError> {
    let mask: Ipv4Addr = netmask.parse()?;
    Ok(mask
        .octets()
        .iter()
        .map(|octet| octet.count_ones() as u8)
        .sum())
}

pub(crate) fn netmask_from_prefix(prefix: u8) -> String {
    let mask = if prefix == 0 {
        0u32
    } else {
        u32::MAX << (32 - u32::from(prefix.min(32)))
    };
    Ipv4Addr::from(mask).to_string()
}

/// Parses `address/prefix` notation used by the legacy IPv6 fields.
pub(crate) fn parse_cidr_address(
    cidr: &str,
) -> Result<InterfaceIpAddr, NetstateError> {
    let (addr, prefix) = cidr.split_once('/').ok_or_else(|| {
        NetstateError::new(
            ErrorKind::InvalidArgument,
            format!("Expected address/prefix, got '{cidr}'"),
        )
    })?;
    let ip: IpAddr = addr.parse()?;
    let prefix = prefix.parse::<u8>().map_err(|e| {
        NetstateError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid prefix length in '{cidr}': {e}"),
        )
    })?;
    Ok(InterfaceIpAddr::new(ip.to_string(), prefix))
}

/// Network address of `addr/netmask` in CIDR notation, e.g.
/// `192.0.2.5` + `255.255.255.0` -> `192.0.2.0/24`.
pub(crate) fn ipv4_network_cidr(
    addr: &str,
    netmask: &str,
) -> Result<String, NetstateError> {
    let ip: Ipv4Addr = addr.parse()?;
    let mask: Ipv4Addr = netmask.parse()?;
    let network =
        Ipv4Addr::from(u32::from(ip) & u32::from(mask));
    Ok(format!("{}/{}", network, prefix_from_netmask(netmask)?))
}

/// Whether the network `cidr` contains `addr`. Both families supported;
/// a family mismatch is simply not a match.
pub(crate) fn network_contains(cidr: &str, addr: &str) -> bool {
    let (net_addr, prefix) = match cidr.split_once('/') {
        Some((a, p)) => (a, p),
        None => return false,
    };
    let prefix: u32 = match prefix.parse() {
        Ok(p) => p,
        Err(_) => return false,
    };
    match (net_addr.parse::<IpAddr>(), addr.parse::<IpAddr>()) {
        (Ok(IpAddr::V4(net)), Ok(IpAddr::V4(ip))) => {
            if prefix > 32 {
                return false;
            }
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            u32::from(net) & mask == u32::from(ip) & mask
        }
        (Ok(IpAddr::V6(net)), Ok(IpAddr::V6(ip))) => {
            if prefix > 128 {
                return false;
            }
            let mask = if prefix == 0 {
                0
            } else {
                u128::MAX << (128 - prefix)
            };
            u128::from(net) & mask == u128::from(ip) & mask
        }
        _ => false,
    }
}

pub(crate) fn is_ipv6_link_local(addr: &str) -> bool {
    addr.parse::<Ipv6Addr>()
        .map(|ip| (ip.segments()[0] & 0xffc0) == 0xfe80)
        .unwrap_or(false)
}
