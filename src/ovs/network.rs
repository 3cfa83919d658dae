// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::{
    dns::Dns,
    iface::{
        BridgeConfig, BridgePortConfig, BridgePortVlanConfig,
        BridgePortVlanMode, Interface, InterfaceState, InterfaceType,
        DEFAULT_MTU,
    },
    ip::IpAddress,
    ovs::{info::OvsInfo, random_bridge_name},
    route::DefaultRouteState,
    route_rule::SourceRoutes,
    state::NetworkingState,
    CurrentState, ErrorKind, InterfaceIpv4, InterfaceIpv6, NetstateError,
    NetworkConfig,
};

/// Builds the desired state of a whole batch of OVS networks: bridge
/// membership planning per southbound device, one northbound interface
/// per network, and the OVN bridge-mapping string.
pub(crate) fn generate_state(
    networks: &[NetworkConfig],
    running_networks: &HashMap<String, NetworkConfig>,
    current: &CurrentState,
) -> Result<NetworkingState, NetstateError> {
    let mut state = NetworkingState::new();
    let ovs_info = OvsInfo::new(running_networks, current);
    let plan = OvsBridge::plan(networks, running_networks, &ovs_info);

    let mut bridges: BTreeMap<String, Interface> = BTreeMap::new();
    // Maps every southbound device of the desired membership to its
    // bridge, including freshly named ones; feeds both the per-network
    // port attachment and the OVN mapping string.
    let mut bridge_of_sb: BTreeMap<String, String> = BTreeMap::new();

    for (sb, membership) in &plan.nets_by_sb {
        if !plan.touched_sbs.contains(sb) {
            if !membership.is_empty() {
                if let Some(bridge) = ovs_info.bridge_by_sb.get(sb) {
                    bridge_of_sb.insert(sb.clone(), bridge.clone());
                }
            }
            continue;
        }
        if membership.is_empty() {
            if let Some(bridge) = ovs_info.bridge_by_sb.get(sb) {
                log::debug!(
                    "Removing OVS bridge {bridge}, no networks left on {sb}"
                );
                state.add_interface(Interface::new_absent(
                    bridge,
                    InterfaceType::OvsBridge,
                ));
            }
            continue;
        }
        let existing = ovs_info.bridge_by_sb.get(sb);
        let bridge_name = existing
            .cloned()
            .unwrap_or_else(random_bridge_name);
        let ports = if existing.is_none() {
            log::debug!("Creating OVS bridge {bridge_name} over {sb}");
            vec![BridgePortConfig {
                name: sb.clone(),
                vlan: None,
            }]
        } else {
            // Ports of networks in this batch are appended back below;
            // anything else on the bridge is not ours to drop.
            ovs_info
                .ports_by_bridge
                .get(&bridge_name)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|port| !plan.batch_names.contains(&port.name))
                .collect()
        };
        let mtu = membership
            .iter()
            .map(|name| {
                plan.batch_confs
                    .get(name.as_str())
                    .map(|net| net.mtu)
                    .or_else(|| {
                        running_networks.get(name.as_str()).map(|r| r.mtu)
                    })
                    .unwrap_or(DEFAULT_MTU)
            })
            .max()
            .unwrap_or(DEFAULT_MTU);

        let mut sb_iface = Interface::new_up(sb);
        sb_iface.mtu = Some(mtu);
        sb_iface.ipv4 = Some(InterfaceIpv4::disabled());
        sb_iface.ipv6 = Some(InterfaceIpv6::disabled());
        state.add_interface(sb_iface);

        bridges.insert(
            bridge_name.clone(),
            Interface {
                name: bridge_name.clone(),
                iface_type: Some(InterfaceType::OvsBridge),
                state: Some(InterfaceState::Up),
                bridge: Some(BridgeConfig {
                    options: None,
                    port: Some(ports),
                }),
                ..Default::default()
            },
        );
        bridge_of_sb.insert(sb.clone(), bridge_name);
    }

    for net in networks {
        let running = running_networks.get(&net.name);
        let dns = Dns::new(net, running);
        let auto_dns = dns.auto_dns();
        if let Some(servers) = dns.into_state() {
            state.add_dns(&net.name, servers);
        }
        state.add_routes(DefaultRouteState::generate(net, running));
        let (src_routes, src_rules) =
            SourceRoutes::generate(net, running, current)?.into_states();
        state.add_routes(src_routes);
        state.add_rules(src_rules);

        if net.remove {
            state.add_interface(Interface::new_absent(
                &net.name,
                InterfaceType::OvsInterface,
            ));
            continue;
        }
        let sb = net.base_iface().ok_or_else(|| {
            NetstateError::new(
                ErrorKind::InvalidArgument,
                format!("Network {} has no base interface", net.name),
            )
        })?;
        let ip = IpAddress::new(net, auto_dns);
        let nb_iface = Interface {
            name: net.name.clone(),
            iface_type: Some(InterfaceType::OvsInterface),
            state: Some(InterfaceState::Up),
            mtu: Some(net.mtu),
            // The northbound interface takes over the carrier's MAC so
            // DHCP leases survive the northbound/southbound split.
            mac_address: current.mac_address(sb).map(str::to_string),
            ipv4: Some(ip.ipv4_state()?),
            ipv6: Some(ip.ipv6_state()?),
            ..Default::default()
        };
        state.add_interface(nb_iface);

        let port = BridgePortConfig {
            name: net.name.clone(),
            vlan: net.vlan.map(|tag| BridgePortVlanConfig {
                mode: Some(BridgePortVlanMode::Access),
                tag: Some(tag),
            }),
        };
        if let Some(bridge) = bridge_of_sb
            .get(sb)
            .and_then(|bridge_name| bridges.get_mut(bridge_name))
        {
            if let Some(ports) =
                bridge.bridge.as_mut().and_then(|b| b.port.as_mut())
            {
                ports.push(port);
            }
        }
    }

    for bridge in bridges.values_mut() {
        if let Some(ports) =
            bridge.bridge.as_mut().and_then(|b| b.port.as_mut())
        {
            ports.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        }
    }
    for (_, bridge) in bridges {
        state.add_interface(bridge);
    }
    state.set_bridge_mappings(ovn_bridge_mappings(&plan, &bridge_of_sb));
    Ok(state)
}

/// Desired bridge membership per southbound device, derived fresh from
/// the read-only indices: batch networks are added to their (possibly
/// new) carrier and removed from the one they left.
struct OvsBridge<'a> {
    nets_by_sb: BTreeMap<String, BTreeSet<String>>,
    touched_sbs: BTreeSet<String>,
    batch_names: HashSet<String>,
    batch_confs: HashMap<&'a str, &'a NetworkConfig>,
}

impl<'a> OvsBridge<'a> {
    fn plan(
        networks: &'a [NetworkConfig],
        running_networks: &HashMap<String, NetworkConfig>,
        ovs_info: &OvsInfo,
    ) -> Self {
        let mut nets_by_sb: BTreeMap<String, BTreeSet<String>> = ovs_info
            .nb_by_sb
            .iter()
            .map(|(sb, nets)| (sb.clone(), nets.iter().cloned().collect()))
            .collect();
        let mut touched_sbs = BTreeSet::new();

        for net in networks {
            let running = running_networks.get(&net.name);
            let old_sb =
                running.and_then(|r| r.base_iface()).map(str::to_string);
            let new_sb = net.base_iface().map(str::to_string);
            let moved =
                !net.remove && running.is_some() && old_sb != new_sb;
            if net.remove || moved {
                if let Some(old_sb) = old_sb {
                    if let Some(nets) = nets_by_sb.get_mut(&old_sb) {
                        nets.remove(&net.name);
                    }
                    touched_sbs.insert(old_sb);
                }
            }
            if !net.remove {
                if let Some(new_sb) = new_sb {
                    nets_by_sb
                        .entry(new_sb.clone())
                        .or_default()
                        .insert(net.name.clone());
                    touched_sbs.insert(new_sb);
                }
            }
        }

        Self {
            nets_by_sb,
            touched_sbs,
            batch_names: networks.iter().map(|n| n.name.clone()).collect(),
            batch_confs: networks
                .iter()
                .map(|n| (n.name.as_str(), n))
                .collect(),
        }
    }
}

// The whole-host northbound-to-bridge declaration, `nb:bridge` pairs
// sorted by northbound name. An OVS batch that ends with zero mappings
// still reports the explicit empty string.
fn ovn_bridge_mappings(
    plan: &OvsBridge<'_>,
    bridge_of_sb: &BTreeMap<String, String>,
) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (sb, nets) in &plan.nets_by_sb {
        if let Some(bridge) = bridge_of_sb.get(sb) {
            for net in nets {
                pairs.push((net.clone(), bridge.clone()));
            }
        }
    }
    pairs.sort_unstable();
    pairs
        .into_iter()
        .map(|(net, bridge)| format!("{net}:{bridge}"))
        .collect::<Vec<String>>()
        .join(",")
}
