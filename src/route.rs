// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::NetworkConfig;

pub(crate) const IPV4_DEFAULT_DESTINATION: &str = "0.0.0.0/0";
pub(crate) const IPV6_DEFAULT_DESTINATION: &str = "::/0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    pub(crate) fn default_destination(&self) -> &'static str {
        match self {
            Self::IPv4 => IPV4_DEFAULT_DESTINATION,
            Self::IPv6 => IPV6_DEFAULT_DESTINATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
/// Route state of the whole document: the `running` view reported by
/// the manager and the `config` list this layer produces.
pub struct Routes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<Vec<RouteEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Vec<RouteEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum RouteState {
    /// Mark a route entry as absent to remove it.
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct RouteEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RouteState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "next-hop-interface"
    )]
    pub next_hop_iface: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "next-hop-address"
    )]
    pub next_hop_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "table-id")]
    pub table_id: Option<u32>,
}

impl RouteEntry {
    /// The main routing table.
    pub const USE_DEFAULT_ROUTE_TABLE: u32 = 254;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.state, Some(RouteState::Absent))
    }

    pub(crate) fn effective_table_id(&self) -> u32 {
        self.table_id.unwrap_or(Self::USE_DEFAULT_ROUTE_TABLE)
    }

    fn default_route(
        family: AddressFamily,
        gateway: &str,
        next_hop_iface: &str,
    ) -> Self {
        Self {
            destination: Some(family.default_destination().to_string()),
            next_hop_addr: Some(gateway.to_string()),
            next_hop_iface: Some(next_hop_iface.to_string()),
            table_id: Some(Self::USE_DEFAULT_ROUTE_TABLE),
            ..Default::default()
        }
    }

    pub(crate) fn add_default(
        family: AddressFamily,
        gateway: &str,
        next_hop_iface: &str,
    ) -> Self {
        Self::default_route(family, gateway, next_hop_iface)
    }

    pub(crate) fn remove_default(
        family: AddressFamily,
        gateway: &str,
        next_hop_iface: &str,
    ) -> Self {
        Self {
            state: Some(RouteState::Absent),
            ..Self::default_route(family, gateway, next_hop_iface)
        }
    }
}

/// Routing table ID for source routes of one interface, derived from
/// the interface name so that it is stable across runs without a
/// central allocator. Checksum collisions between interface names are
/// accepted as negligible.
pub fn generate_table_id(next_hop_iface: &str) -> u32 {
    adler32(next_hop_iface.as_bytes())
}

const ADLER32_MODULO: u32 = 65521;

fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for byte in data {
        a = (a + u32::from(*byte)) % ADLER32_MODULO;
        b = (b + a) % ADLER32_MODULO;
    }
    (b << 16) | a
}

/// Default-route churn of one network against its previously running
/// configuration, for both address families.
pub(crate) struct DefaultRouteState;

impl DefaultRouteState {
    pub(crate) fn generate(
        net: &NetworkConfig,
        running: Option<&NetworkConfig>,
    ) -> Vec<RouteEntry> {
        let mut routes = Vec::new();
        for family in [AddressFamily::IPv4, AddressFamily::IPv6] {
            routes.extend(Self::family_state(family, net, running));
        }
        routes
    }

    fn family_state(
        family: AddressFamily,
        net: &NetworkConfig,
        running: Option<&NetworkConfig>,
    ) -> Vec<RouteEntry> {
        let mut routes = Vec::new();
        let next_hop = match net.next_hop_iface() {
            Some(iface) => iface,
            None => match running.and_then(|r| r.next_hop_iface()) {
                Some(iface) => iface,
                None => return routes,
            },
        };
        let gateway = net.gateway(family);
        let running_gateway = running.and_then(|r| r.gateway(family));

        if let Some(gateway) = gateway {
            if net.default_route {
                routes.push(RouteEntry::add_default(
                    family, gateway, &next_hop,
                ));
            } else {
                routes.push(RouteEntry::remove_default(
                    family, gateway, &next_hop,
                ));
            }
            if let Some(prev) = running_gateway {
                if prev != gateway {
                    routes.push(RouteEntry::remove_default(
                        family, prev, &next_hop,
                    ));
                }
            }
        } else if let Some(prev) = running_gateway {
            // Covers a lost DHCP lease and a demotion from default
            // route: the stale default route must go even though the
            // new config no longer mentions a gateway.
            let prev_owned_default =
                running.map(|r| r.default_route).unwrap_or(false);
            if prev_owned_default
                && !net.remove
                && (net.is_dynamic(family) || !net.default_route)
            {
                routes.push(RouteEntry::remove_default(
                    family, prev, &next_hop,
                ));
            }
        }
        routes
    }
}
