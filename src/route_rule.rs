// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    ip::ipv4_network_cidr,
    route::{generate_table_id, AddressFamily, RouteEntry, RouteState},
    CurrentState, NetstateError, NetworkConfig,
};

pub(crate) const SOURCE_ROUTE_RULE_PRIORITY: i64 = 3200;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
/// Route rule state of the whole document. The manager only reports a
/// `config` view for rules, there is no separate running list.
pub struct RouteRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Vec<RouteRuleEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum RouteRuleState {
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct RouteRuleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RouteRuleState>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "ip-from")]
    pub ip_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "ip-to")]
    pub ip_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "route-table")]
    pub table_id: Option<u32>,
}

impl RouteRuleEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.state, Some(RouteRuleState::Absent))
    }
}

/// Policy-routing churn of one network: the per-interface routing table
/// holding its own default route plus the from/to rules selecting it.
///
/// IPv6 source routing is not supported; only the IPv4 configuration is
/// examined.
pub(crate) struct SourceRoutes {
    routes: Vec<RouteEntry>,
    rules: Vec<RouteRuleEntry>,
}

impl SourceRoutes {
    pub(crate) fn generate(
        net: &NetworkConfig,
        running: Option<&NetworkConfig>,
        current: &CurrentState,
    ) -> Result<Self, NetstateError> {
        let mut routes = Vec::new();
        let mut rules = Vec::new();

        if Self::should_remove_outdated(net, running) {
            let scan_iface = running
                .and_then(|r| r.next_hop_iface())
                .or_else(|| net.next_hop_iface());
            if let Some(scan_iface) = scan_iface {
                let (removed_routes, removed_rules) =
                    source_route_remove_state(&scan_iface, current);
                routes.extend(removed_routes);
                rules.extend(removed_rules);
            }
        }

        let gateway = net.gateway(AddressFamily::IPv4);
        let running_gateway =
            running.and_then(|r| r.gateway(AddressFamily::IPv4));
        if let (Some(gateway), Some(addr), Some(netmask)) = (
            gateway,
            net.ipv4_addr.as_deref(),
            net.ipv4_netmask.as_deref(),
        ) {
            if Some(gateway) != running_gateway {
                if let Some(next_hop) = net.next_hop_iface() {
                    let (add_routes, add_rules) = source_route_add_state(
                        &next_hop, addr, netmask, gateway,
                    )?;
                    routes.extend(add_routes);
                    rules.extend(add_rules);
                }
            }
        }

        Ok(Self { routes, rules })
    }

    fn should_remove_outdated(
        net: &NetworkConfig,
        running: Option<&NetworkConfig>,
    ) -> bool {
        if net.remove {
            return true;
        }
        let running = match running {
            Some(r) => r,
            None => return false,
        };
        let switched_ip_origin = (running.is_static_ipv4() && net.dhcpv4)
            || (running.dhcpv4 && net.is_static_ipv4());
        let gateway_changed = running.gateway(AddressFamily::IPv4).is_some()
            && running.gateway(AddressFamily::IPv4)
                != net.gateway(AddressFamily::IPv4);
        switched_ip_origin || gateway_changed
    }

    pub(crate) fn into_states(
        self,
    ) -> (Vec<RouteEntry>, Vec<RouteRuleEntry>) {
        (self.routes, self.rules)
    }
}

/// The remove half of the source-route state: capture every live route
/// of the interface outside the main table, mark it and every rule
/// selecting its table as absent. Removals are emitted before any
/// addition so a reused table ID never collides.
pub(crate) fn source_route_remove_state(
    scan_iface: &str,
    current: &CurrentState,
) -> (Vec<RouteEntry>, Vec<RouteRuleEntry>) {
    let mut routes = Vec::new();
    let mut rules = Vec::new();
    let mut stale_tables: HashSet<u32> = HashSet::new();
    for route in current.routes.iter().filter(|r| {
        r.next_hop_iface.as_deref() == Some(scan_iface)
            && r.effective_table_id() != RouteEntry::USE_DEFAULT_ROUTE_TABLE
    }) {
        stale_tables.insert(route.effective_table_id());
        let mut removed = route.clone();
        removed.state = Some(RouteState::Absent);
        routes.push(removed);
    }
    for rule in current.rules.iter().filter(|r| {
        r.table_id
            .map(|id| stale_tables.contains(&id))
            .unwrap_or(false)
    }) {
        let mut removed = rule.clone();
        removed.state = Some(RouteRuleState::Absent);
        rules.push(removed);
    }
    (routes, rules)
}

/// The add half of the source-route state: a per-interface table with
/// the default route via `gateway` and the local network route, plus
/// the from/to rules pointing at that table. Also used directly for
/// dynamic (DHCP-provided) addresses.
pub(crate) fn source_route_add_state(
    next_hop_iface: &str,
    addr: &str,
    netmask: &str,
    gateway: &str,
) -> Result<(Vec<RouteEntry>, Vec<RouteRuleEntry>), NetstateError> {
    let table_id = generate_table_id(next_hop_iface);
    let network = ipv4_network_cidr(addr, netmask)?;
    let routes = vec![
        RouteEntry {
            destination: Some(
                AddressFamily::IPv4.default_destination().to_string(),
            ),
            next_hop_addr: Some(gateway.to_string()),
            next_hop_iface: Some(next_hop_iface.to_string()),
            table_id: Some(table_id),
            ..Default::default()
        },
        RouteEntry {
            destination: Some(network.clone()),
            next_hop_addr: Some(addr.to_string()),
            next_hop_iface: Some(next_hop_iface.to_string()),
            table_id: Some(table_id),
            ..Default::default()
        },
    ];
    let rules = vec![
        RouteRuleEntry {
            ip_from: Some(network.clone()),
            table_id: Some(table_id),
            priority: Some(SOURCE_ROUTE_RULE_PRIORITY),
            ..Default::default()
        },
        RouteRuleEntry {
            ip_to: Some(network),
            table_id: Some(table_id),
            priority: Some(SOURCE_ROUTE_RULE_PRIORITY),
            ..Default::default()
        },
    ];
    Ok((routes, rules))
}
