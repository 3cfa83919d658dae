// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    dns::Dns,
    iface::{
        BridgeConfig, BridgeOptions, BridgePortConfig, BridgeStpOptions,
        Interface, InterfaceState, InterfaceType, VlanConfig, DEFAULT_MTU,
    },
    ip::IpAddress,
    route::DefaultRouteState,
    route_rule::SourceRoutes,
    state::NetworkingState,
    CurrentState, ErrorKind, InterfaceIpv4, InterfaceIpv6, NetstateError,
    NetworkConfig,
};

/// Builds the desired state of a whole batch of Linux-bridge networks:
/// the per-network southbound/VLAN/bridge fragments followed by the
/// batch-wide cleanup passes over shared base devices.
pub(crate) fn generate_state(
    networks: &[NetworkConfig],
    running_networks: &HashMap<String, NetworkConfig>,
    current: &CurrentState,
) -> Result<NetworkingState, NetstateError> {
    let mut state = NetworkingState::new();
    // Southbound fragments are folded separately: several networks may
    // share one base device and their requests merge by union with the
    // largest MTU winning.
    let mut southbound: BTreeMap<String, Interface> = BTreeMap::new();
    let mut configured_bases: HashSet<String> = HashSet::new();

    for net in networks {
        let running = running_networks.get(&net.name);
        let builder = LinuxBrNet { net, running };
        builder.build(&mut state, &mut southbound)?;
        if !net.remove {
            if let Some(base) = net.base_iface() {
                configured_bases.insert(base.to_string());
            }
        }
        let dns = Dns::new(net, running);
        if let Some(servers) = dns.into_state() {
            state.add_dns(&net.name, servers);
        }
        state.add_routes(DefaultRouteState::generate(net, running));
        let (src_routes, src_rules) =
            SourceRoutes::generate(net, running, current)?.into_states();
        state.add_routes(src_routes);
        state.add_rules(src_rules);
    }

    disable_ip_on_inactive_vlan_bases(
        networks,
        current,
        &mut southbound,
    );
    recreate_detached_bases(networks, running_networks, &mut southbound, &configured_bases);
    purge_orphaned_vlans(networks, running_networks, &state, &mut southbound);
    reset_stale_base_mtu(
        networks,
        running_networks,
        current,
        &mut southbound,
        &configured_bases,
    );
    keep_default_route_iface_mtu(
        networks,
        running_networks,
        current,
        &mut state,
        &southbound,
    );

    for (_, iface) in southbound {
        state.add_interface(iface);
    }
    Ok(state)
}

struct LinuxBrNet<'a> {
    net: &'a NetworkConfig,
    running: Option<&'a NetworkConfig>,
}

impl LinuxBrNet<'_> {
    // A removal request carries an essentially empty config; the
    // device facts (base, VLAN, bridged) of what is being torn down
    // live in the previously running entry.
    fn device_conf(&self) -> &NetworkConfig {
        if self.net.remove {
            self.running.unwrap_or(self.net)
        } else {
            self.net
        }
    }

    fn build(
        &self,
        state: &mut NetworkingState,
        southbound: &mut BTreeMap<String, Interface>,
    ) -> Result<(), NetstateError> {
        if self.net.remove {
            self.build_removal(state, southbound);
            Ok(())
        } else {
            self.build_config(state, southbound)
        }
    }

    fn build_removal(
        &self,
        state: &mut NetworkingState,
        southbound: &mut BTreeMap<String, Interface>,
    ) {
        let conf = self.device_conf();
        if let Some(base) = conf.base_iface() {
            // Mentioned without properties: no change is forced on the
            // carrier unless a later pass decides otherwise.
            southbound
                .entry(base.to_string())
                .or_insert_with(|| Interface::new(base));
        }
        if let Some(vlan_iface) = conf.vlan_iface() {
            state.add_interface(Interface::new_absent(
                &vlan_iface,
                InterfaceType::Vlan,
            ));
        }
        if conf.bridged {
            state.add_interface(Interface::new_absent(
                &self.net.name,
                InterfaceType::LinuxBridge,
            ));
        }
    }

    fn build_config(
        &self,
        state: &mut NetworkingState,
        southbound: &mut BTreeMap<String, Interface>,
    ) -> Result<(), NetstateError> {
        let net = self.net;
        let base = net.base_iface().ok_or_else(|| {
            NetstateError::new(
                ErrorKind::InvalidArgument,
                format!("Network {} has no base interface", net.name),
            )
        })?;

        let mut sb_iface = Interface::new_up(base);
        sb_iface.mtu = Some(net.mtu);

        let mut vlan_iface = match (net.vlan_iface(), net.vlan) {
            (Some(name), Some(tag)) => {
                let mut iface = Interface::new_up(&name);
                iface.iface_type = Some(InterfaceType::Vlan);
                iface.mtu = Some(net.mtu);
                iface.vlan = Some(VlanConfig {
                    base_iface: base.to_string(),
                    id: tag,
                });
                Some(iface)
            }
            _ => None,
        };

        let dns = Dns::new(net, self.running);
        let ip = IpAddress::new(net, dns.auto_dns());
        let ipv4 = ip.ipv4_state()?;
        let ipv6 = ip.ipv6_state()?;

        if net.bridged {
            let port_name = net
                .vlan_iface()
                .unwrap_or_else(|| base.to_string());
            let bridge = Interface {
                name: net.name.clone(),
                iface_type: Some(InterfaceType::LinuxBridge),
                state: Some(InterfaceState::Up),
                mtu: Some(net.mtu),
                bridge: Some(BridgeConfig {
                    options: Some(BridgeOptions {
                        stp: Some(BridgeStpOptions {
                            enabled: Some(net.stp),
                        }),
                    }),
                    port: Some(vec![BridgePortConfig {
                        name: port_name,
                        vlan: None,
                    }]),
                }),
                ipv4: Some(ipv4),
                ipv6: Some(ipv6),
                ..Default::default()
            };
            state.add_interface(bridge);
            // The bridge holds the IP; its port must not.
            match vlan_iface.as_mut() {
                Some(vlan) => {
                    vlan.ipv4 = Some(InterfaceIpv4::disabled());
                    vlan.ipv6 = Some(InterfaceIpv6::disabled());
                }
                None => {
                    sb_iface.ipv4 = Some(InterfaceIpv4::disabled());
                    sb_iface.ipv6 = Some(InterfaceIpv6::disabled());
                }
            }
        } else {
            if self.running.map(|r| r.bridged).unwrap_or(false) {
                state.add_interface(Interface::new_absent(
                    &net.name,
                    InterfaceType::LinuxBridge,
                ));
            }
            match vlan_iface.as_mut() {
                Some(vlan) => {
                    vlan.ipv4 = Some(ipv4);
                    vlan.ipv6 = Some(ipv6);
                }
                None => {
                    sb_iface.ipv4 = Some(ipv4);
                    sb_iface.ipv6 = Some(ipv6);
                }
            }
        }

        if let Some(vlan) = vlan_iface {
            state.add_interface(vlan);
        }
        match southbound.get_mut(base) {
            Some(existing) => existing.union_with(sb_iface),
            None => {
                southbound.insert(base.to_string(), sb_iface);
            }
        }
        Ok(())
    }
}

// A VLAN base device that is not up yet must not bring up a default IP
// stack before the VLAN itself is configured.
fn disable_ip_on_inactive_vlan_bases(
    networks: &[NetworkConfig],
    current: &CurrentState,
    southbound: &mut BTreeMap<String, Interface>,
) {
    for net in networks.iter().filter(|n| !n.remove && n.vlan.is_some()) {
        let base = match net.base_iface() {
            Some(base) => base,
            None => continue,
        };
        if current.is_up(base) {
            continue;
        }
        if let Some(sb_iface) = southbound.get_mut(base) {
            if !sb_iface.has_ip_config() {
                sb_iface.ipv4 = Some(InterfaceIpv4::disabled());
                sb_iface.ipv6 = Some(InterfaceIpv6::disabled());
            }
        }
    }
}

// A removed VLAN-less network would otherwise leave its carrier in a
// half-configured state; bring it back to an IP-less default.
fn recreate_detached_bases(
    networks: &[NetworkConfig],
    running_networks: &HashMap<String, NetworkConfig>,
    southbound: &mut BTreeMap<String, Interface>,
    configured_bases: &HashSet<String>,
) {
    for net in networks.iter().filter(|n| n.remove) {
        let conf = running_networks.get(&net.name).unwrap_or(net);
        if conf.vlan.is_some() {
            continue;
        }
        let base = match conf.base_iface() {
            Some(base) => base,
            None => continue,
        };
        if configured_bases.contains(base) {
            continue;
        }
        let mut iface = Interface::new_up(base);
        iface.mtu = Some(DEFAULT_MTU);
        iface.ipv4 = Some(InterfaceIpv4::disabled());
        iface.ipv6 = Some(InterfaceIpv6::disabled());
        southbound.insert(base.to_string(), iface);
    }
}

// A VLAN whose network moved to another base device leaves the old
// VLAN interface dangling; remove it unless something else in this
// batch already claims that name.
fn purge_orphaned_vlans(
    networks: &[NetworkConfig],
    running_networks: &HashMap<String, NetworkConfig>,
    state: &NetworkingState,
    southbound: &mut BTreeMap<String, Interface>,
) {
    let mut orphans: Vec<String> = Vec::new();
    for net in networks.iter().filter(|n| !n.remove && n.vlan.is_some()) {
        let running = match running_networks.get(&net.name) {
            Some(running) => running,
            None => continue,
        };
        if running.vlan.is_none()
            || running.base_iface() == net.base_iface()
        {
            continue;
        }
        if let Some(old_vlan_iface) = running.vlan_iface() {
            if !state.contains_interface(&old_vlan_iface)
                && !southbound.contains_key(&old_vlan_iface)
            {
                orphans.push(old_vlan_iface);
            }
        }
    }
    for orphan in orphans {
        southbound.insert(
            orphan.clone(),
            Interface::new_absent(&orphan, InterfaceType::Vlan),
        );
    }
}

// A base device whose sole network detached keeps its bumped MTU in
// the kernel; push it back to the default.
fn reset_stale_base_mtu(
    networks: &[NetworkConfig],
    running_networks: &HashMap<String, NetworkConfig>,
    current: &CurrentState,
    southbound: &mut BTreeMap<String, Interface>,
    configured_bases: &HashSet<String>,
) {
    for net in networks {
        let running = match running_networks.get(&net.name) {
            Some(running) => running,
            None => continue,
        };
        let detached = net.remove
            || running.base_iface() != net.base_iface();
        if !detached {
            continue;
        }
        let old_base = match running.base_iface() {
            Some(base) => base,
            None => continue,
        };
        if configured_bases.contains(old_base) {
            continue;
        }
        let referencing = running_networks
            .values()
            .filter(|r| r.base_iface() == Some(old_base))
            .count();
        let live_mtu = current.mtu(old_base);
        if referencing == 1
            && live_mtu.is_some()
            && live_mtu != Some(DEFAULT_MTU)
        {
            let iface = southbound
                .entry(old_base.to_string())
                .or_insert_with(|| Interface::new_up(old_base));
            iface.state = Some(InterfaceState::Up);
            iface.mtu = Some(DEFAULT_MTU);
        }
    }
}

// Workaround for the state applier's MTU dependency computation: with
// DNS entries present but no default-route network in the batch, the
// applier needs the previous default-route interface pinned to its
// current MTU. Keep until the applier limitation is fixed.
fn keep_default_route_iface_mtu(
    networks: &[NetworkConfig],
    running_networks: &HashMap<String, NetworkConfig>,
    current: &CurrentState,
    state: &mut NetworkingState,
    southbound: &BTreeMap<String, Interface>,
) {
    if networks.iter().any(|n| !n.remove && n.default_route) {
        return;
    }
    let mut running_names: Vec<&String> = running_networks.keys().collect();
    running_names.sort_unstable();
    let prev_default = running_names
        .into_iter()
        .filter_map(|name| running_networks.get(name))
        .find(|r| r.default_route);
    let iface_name = match prev_default.and_then(|r| r.next_hop_iface()) {
        Some(name) => name,
        None => return,
    };
    if state.contains_interface(&iface_name)
        || southbound.contains_key(&iface_name)
    {
        return;
    }
    if let Some(mtu) = current.mtu(&iface_name) {
        log::debug!(
            "Pinning current MTU {mtu} of previous default route \
            interface {iface_name}"
        );
        let mut iface = Interface::new(&iface_name);
        iface.mtu = Some(mtu);
        state.add_interface(iface);
    }
}
