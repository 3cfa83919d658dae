// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};

use crate::{
    iface::{Interface, InterfaceType, DEFAULT_MTU},
    CurrentState, DnsClientState, DnsResolverState, NetworkState,
    OvsDbGlobalConfig, RouteEntry, RouteRuleEntry, RouteRules, Routes,
};

/// Accumulates per-network interface/route/rule/DNS fragments and
/// assembles the final desired-state document.
///
/// Fragments are folded in a fixed order: per-network builders first,
/// bond layering second, the MTU propagation passes third; the final
/// document sorts interfaces by name for determinism.
#[derive(Debug, Default)]
pub(crate) struct NetworkingState {
    ifaces: HashMap<String, Interface>,
    routes: Vec<RouteEntry>,
    rules: Vec<RouteRuleEntry>,
    dns_by_net: Vec<(String, Vec<String>)>,
    bridge_mappings: Option<String>,
}

impl NetworkingState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a fragment, last write wins.
    pub(crate) fn add_interface(&mut self, iface: Interface) {
        self.ifaces.insert(iface.name.clone(), iface);
    }

    /// Merge a fragment into an existing one for the same device:
    /// present fields win, MTU takes the larger request.
    pub(crate) fn merge_interface(&mut self, iface: Interface) {
        match self.ifaces.get_mut(&iface.name) {
            Some(existing) => existing.union_with(iface),
            None => self.add_interface(iface),
        }
    }

    pub(crate) fn contains_interface(&self, name: &str) -> bool {
        self.ifaces.contains_key(name)
    }

    pub(crate) fn add_routes(&mut self, routes: Vec<RouteEntry>) {
        self.routes.extend(routes);
    }

    pub(crate) fn add_rules(&mut self, rules: Vec<RouteRuleEntry>) {
        self.rules.extend(rules);
    }

    pub(crate) fn add_dns(&mut self, net_name: &str, servers: Vec<String>) {
        self.dns_by_net.push((net_name.to_string(), servers));
    }

    pub(crate) fn set_bridge_mappings(&mut self, mappings: String) {
        self.bridge_mappings = Some(mappings);
    }

    /// Layer bond fragments into the interface map. A bond may already
    /// carry a fragment from serving as a network's base device; its
    /// IP and MTU fields survive, the bond fields fill the gaps.
    /// Removal fragments replace whatever was computed.
    pub(crate) fn add_bond_states(&mut self, bonds: Vec<Interface>) {
        for bond in bonds {
            if bond.is_absent() {
                self.add_interface(bond);
            } else {
                self.merge_interface(bond);
            }
        }
    }

    /// The two cross-cutting MTU passes. The VLAN pass only applies to
    /// batches that requested Linux-bridge networks; the bond pass
    /// always runs.
    pub(crate) fn update_mtu(
        &mut self,
        linux_bridge_requested: bool,
        current: &CurrentState,
    ) {
        if linux_bridge_requested {
            self.propagate_vlan_mtu_to_base(current);
        }
        self.propagate_bond_mtu_to_slaves(current);
    }

    // A VLAN's effective MTU can never exceed its carrier device's, so
    // every base interface is raised to the largest MTU among its live
    // VLANs and its own desired value.
    fn propagate_vlan_mtu_to_base(&mut self, current: &CurrentState) {
        let mut mtus_by_base: HashMap<String, Vec<u64>> = HashMap::new();
        for (name, cur_iface) in current
            .interfaces
            .iter()
            .filter(|(_, i)| i.iface_type == Some(InterfaceType::Vlan))
        {
            if self
                .ifaces
                .get(name)
                .map(Interface::is_absent)
                .unwrap_or(false)
            {
                continue;
            }
            let base = match cur_iface.vlan.as_ref() {
                Some(vlan) => vlan.base_iface.clone(),
                None => continue,
            };
            let vlan_mtu = self
                .ifaces
                .get(name)
                .and_then(|i| i.mtu)
                .or(cur_iface.mtu);
            let entry = mtus_by_base.entry(base.clone()).or_default();
            if let Some(mtu) = vlan_mtu {
                entry.push(mtu);
            }
            if let Some(base_mtu) =
                self.ifaces.get(&base).and_then(|i| i.mtu)
            {
                entry.push(base_mtu);
            }
        }
        let mut bases: Vec<String> = mtus_by_base.keys().cloned().collect();
        bases.sort_unstable();
        for base in bases {
            let max_mtu = match mtus_by_base[&base].iter().max() {
                Some(mtu) => *mtu,
                None => continue,
            };
            if current.mtu(&base) == Some(max_mtu) {
                continue;
            }
            self.ifaces
                .entry(base.clone())
                .or_insert_with(|| Interface::new_up(&base))
                .mtu = Some(max_mtu);
        }
    }

    // Bond ports must carry at least the bond's MTU. Slaves already in
    // the desired state keep the larger of both requests (a VLAN can
    // sit directly on a slave); untouched slaves get a fragment only
    // when their live MTU disagrees.
    fn propagate_bond_mtu_to_slaves(&mut self, current: &CurrentState) {
        let mut bond_names: HashSet<String> = self
            .ifaces
            .values()
            .filter(|i| i.iface_type == Some(InterfaceType::Bond))
            .map(|i| i.name.clone())
            .collect();
        bond_names.extend(
            current
                .interfaces
                .values()
                .filter(|i| i.iface_type == Some(InterfaceType::Bond))
                .map(|i| i.name.clone()),
        );
        let mut sorted_names: Vec<String> = bond_names.into_iter().collect();
        sorted_names.sort_unstable();

        for bond_name in sorted_names {
            let desired = self.ifaces.get(&bond_name);
            let removed =
                desired.map(Interface::is_absent).unwrap_or(false);
            let bond_mtu = if removed {
                DEFAULT_MTU
            } else {
                desired
                    .and_then(|i| i.mtu)
                    .or_else(|| current.mtu(&bond_name))
                    .unwrap_or(DEFAULT_MTU)
            };
            let slaves: Vec<String> = desired
                .filter(|i| !i.is_absent())
                .and_then(|i| i.bond.as_ref())
                .and_then(|bond| bond.port.clone())
                .or_else(|| {
                    current
                        .interfaces
                        .get(&bond_name)
                        .and_then(|i| i.bond.as_ref())
                        .and_then(|bond| bond.port.clone())
                })
                .unwrap_or_default();
            for slave in slaves {
                if let Some(frag) = self.ifaces.get_mut(&slave) {
                    frag.mtu = Some(
                        frag.mtu.map_or(bond_mtu, |m| m.max(bond_mtu)),
                    );
                } else if current
                    .mtu(&slave)
                    .map(|mtu| mtu != bond_mtu)
                    .unwrap_or(false)
                {
                    let mut frag = Interface::new_up(&slave);
                    frag.mtu = Some(bond_mtu);
                    self.add_interface(frag);
                }
            }
        }
    }

    /// Final document: name-sorted interfaces, route/rule/DNS sections
    /// only when non-empty. A `Some("")` bridge mapping is preserved,
    /// it tells the manager "an OVS batch with zero mappings" as
    /// opposed to "no OVS involvement at all".
    pub(crate) fn state(self) -> NetworkState {
        let mut interfaces: Vec<Interface> =
            self.ifaces.into_values().collect();
        interfaces.sort_unstable_by(|a, b| a.name.cmp(&b.name));

        let routes = if self.routes.is_empty() {
            None
        } else {
            Some(Routes {
                config: Some(self.routes),
                running: None,
            })
        };
        let rules = if self.rules.is_empty() {
            None
        } else {
            Some(RouteRules {
                config: Some(self.rules),
            })
        };
        let dns = if self.dns_by_net.is_empty() {
            None
        } else {
            let servers: Vec<String> = self
                .dns_by_net
                .into_iter()
                .flat_map(|(_, servers)| servers)
                .collect();
            Some(DnsResolverState {
                config: Some(DnsClientState {
                    server: Some(servers),
                    search: None,
                }),
                running: None,
            })
        };
        NetworkState {
            interfaces,
            routes,
            rules,
            dns,
            ovsdb: self
                .bridge_mappings
                .map(OvsDbGlobalConfig::with_bridge_mappings),
        }
    }
}
