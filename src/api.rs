// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::{
    bond, linux_bridge, ovs,
    route_rule::{source_route_add_state, source_route_remove_state},
    state::NetworkingState,
    BondAttributes, CurrentState, NetstateError, NetworkAttributes,
    NetworkConfig, NetworkState, RouteRules, Routes, SwitchType,
};

/// External state manager this layer talks to. Implementations fetch
/// the reported state and apply a desired document; errors pass
/// through unchanged, this layer neither wraps nor retries them.
pub trait NmstateClient {
    fn retrieve_state(&self) -> Result<NetworkState, NetstateError>;

    /// Apply a desired state. With `verify_change` the manager rolls
    /// the change back on its own when the applied state cannot be
    /// confirmed.
    fn apply_state(
        &self,
        state: &NetworkState,
        verify_change: bool,
    ) -> Result<(), NetstateError>;
}

/// Translates one batch of legacy network/bonding changes, diffed
/// against the previously persisted running config and the live
/// current state, into the desired-state document.
pub fn generate_state(
    networks: &HashMap<String, NetworkAttributes>,
    bondings: &HashMap<String, BondAttributes>,
    running_networks: &HashMap<String, NetworkAttributes>,
    running_bonds: &HashMap<String, BondAttributes>,
    current_state: &CurrentState,
) -> Result<NetworkState, NetstateError> {
    let mut net_confs: Vec<NetworkConfig> = Vec::new();
    let mut names: Vec<&String> = networks.keys().collect();
    names.sort_unstable();
    for name in names {
        net_confs.push(NetworkConfig::new(name, &networks[name])?);
    }
    let mut running_confs: HashMap<String, NetworkConfig> = HashMap::new();
    for (name, attrs) in running_networks {
        running_confs
            .insert(name.clone(), NetworkConfig::new(name, attrs)?);
    }

    // The switch implementation is chosen once for the whole batch; a
    // removal entry carries no switch type of its own, the running
    // entry tells which path tears it down.
    let ovs_requested = net_confs.iter().any(|net| {
        net.switch == SwitchType::Ovs
            || (net.remove
                && running_confs
                    .get(&net.name)
                    .map(|r| r.switch == SwitchType::Ovs)
                    .unwrap_or(false))
    });

    let mut state = if net_confs.is_empty() {
        NetworkingState::new()
    } else if ovs_requested {
        ovs::network::generate_state(
            &net_confs,
            &running_confs,
            current_state,
        )?
    } else {
        linux_bridge::generate_state(
            &net_confs,
            &running_confs,
            current_state,
        )?
    };

    state.add_bond_states(bond::generate_state(bondings, running_bonds));
    let linux_bridge_requested = !net_confs.is_empty() && !ovs_requested;
    state.update_mtu(linux_bridge_requested, current_state);
    Ok(state.state())
}

/// Fetch and index the manager's reported state.
pub fn get_current_state(
    client: &dyn NmstateClient,
) -> Result<CurrentState, NetstateError> {
    Ok(CurrentState::new(&client.retrieve_state()?))
}

/// Apply a computed desired state, logging the full document first.
pub fn setup(
    client: &dyn NmstateClient,
    desired_state: &NetworkState,
    verify_change: bool,
) -> Result<(), NetstateError> {
    log::info!("Desired state: {}", desired_state.to_json()?);
    client.apply_state(desired_state, verify_change)
}

/// Source-route document for a dynamically (DHCP) addressed interface,
/// built when the lease delivers the address and gateway.
pub fn generate_dynamic_source_route_state(
    next_hop_iface: &str,
    address: &str,
    netmask: &str,
    gateway: &str,
) -> Result<NetworkState, NetstateError> {
    let (routes, rules) =
        source_route_add_state(next_hop_iface, address, netmask, gateway)?;
    Ok(NetworkState {
        routes: Some(Routes {
            config: Some(routes),
            running: None,
        }),
        rules: Some(RouteRules {
            config: Some(rules),
        }),
        ..Default::default()
    })
}

/// Removal counterpart of
/// [generate_dynamic_source_route_state], scanning the live state for
/// everything routed through the interface outside the main table.
pub fn remove_dynamic_source_route_state(
    next_hop_iface: &str,
    current_state: &CurrentState,
) -> NetworkState {
    let (routes, rules) =
        source_route_remove_state(next_hop_iface, current_state);
    NetworkState {
        routes: if routes.is_empty() {
            None
        } else {
            Some(Routes {
                config: Some(routes),
                running: None,
            })
        },
        rules: if rules.is_empty() {
            None
        } else {
            Some(RouteRules {
                config: Some(rules),
            })
        },
        ..Default::default()
    }
}
