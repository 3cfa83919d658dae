// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::{
    generate_state,
    unit_tests::testlib::{current_state, networks},
    BridgePortVlanMode, Interface, InterfaceIpv4, InterfaceIpv6,
    InterfaceState, InterfaceType, NetworkState, BRIDGE_NAME_PREFIX,
    OVN_BRIDGE_MAPPINGS_KEY,
};

fn iface<'a>(interfaces: &'a [Interface], name: &str) -> &'a Interface {
    interfaces
        .iter()
        .find(|i| i.name == name)
        .unwrap_or_else(|| panic!("interface {name} missing"))
}

fn ovs_bridge(state: &NetworkState) -> &Interface {
    state
        .interfaces
        .iter()
        .find(|i| i.iface_type == Some(InterfaceType::OvsBridge))
        .expect("no ovs bridge in state")
}

fn bridge_mappings(state: &NetworkState) -> &str {
    state
        .ovsdb
        .as_ref()
        .unwrap()
        .external_ids
        .get(OVN_BRIDGE_MAPPINGS_KEY)
        .unwrap()
}

#[test]
fn test_new_ovs_network_creates_a_prefixed_bridge() {
    let nets = networks(&[(
        "netA",
        r#"
        nic: eth1
        switch: ovs
        bridged: true
        "#,
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: eth1
          type: ethernet
          state: up
          mtu: 1500
          mac-address: "00:11:22:33:44:55"
        "#,
    );

    let state = generate_state(
        &nets,
        &HashMap::new(),
        &HashMap::new(),
        &HashMap::new(),
        &current,
    )
    .unwrap();

    let bridge = ovs_bridge(&state);
    assert!(bridge.name.starts_with(BRIDGE_NAME_PREFIX));
    assert_eq!(bridge.state, Some(InterfaceState::Up));
    let port_names: Vec<&str> = bridge
        .bridge
        .as_ref()
        .unwrap()
        .port
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(port_names, vec!["eth1", "netA"]);

    let nb = iface(&state.interfaces, "netA");
    assert_eq!(nb.iface_type, Some(InterfaceType::OvsInterface));
    assert_eq!(nb.mac_address.as_deref(), Some("00:11:22:33:44:55"));

    let sb = iface(&state.interfaces, "eth1");
    assert_eq!(sb.ipv4, Some(InterfaceIpv4::disabled()));
    assert_eq!(sb.ipv6, Some(InterfaceIpv6::disabled()));

    assert_eq!(
        bridge_mappings(&state),
        format!("netA:{}", bridge.name)
    );
}

#[test]
fn test_existing_bridge_name_is_reused() {
    let nets = networks(&[(
        "netA",
        r#"
        nic: eth0
        switch: ovs
        bridged: true
        mtu: 9000
        "#,
    )]);
    let running = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: vdsmbr_test1
          type: ovs-bridge
          state: up
          bridge:
            port:
            - name: eth0
            - name: netA
        - name: eth0
          type: ethernet
          state: up
          mtu: 1500
        - name: netA
          type: ovs-interface
          state: up
          mtu: 1500
        "#,
    );

    let state = generate_state(
        &nets,
        &HashMap::new(),
        &running,
        &HashMap::new(),
        &current,
    )
    .unwrap();

    let bridge = ovs_bridge(&state);
    assert_eq!(bridge.name, "vdsmbr_test1");
    let port_names: Vec<&str> = bridge
        .bridge
        .as_ref()
        .unwrap()
        .port
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(port_names, vec!["eth0", "netA"]);
    assert_eq!(iface(&state.interfaces, "eth0").mtu, Some(9000));
    assert_eq!(bridge_mappings(&state), "netA:vdsmbr_test1");

    // A second run over identical input is byte-identical, the bridge
    // name is never re-randomized.
    let again = generate_state(
        &nets,
        &HashMap::new(),
        &running,
        &HashMap::new(),
        &current,
    )
    .unwrap();
    assert_eq!(state, again);
}

#[test]
fn test_removing_the_last_network_tears_down_the_bridge() {
    let nets = networks(&[("netA", "remove: true")]);
    let running = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: vdsmbr_test1
          type: ovs-bridge
          state: up
          bridge:
            port:
            - name: eth0
            - name: netA
        - name: eth0
          type: ethernet
          state: up
        - name: netA
          type: ovs-interface
          state: up
        "#,
    );

    let state = generate_state(
        &nets,
        &HashMap::new(),
        &running,
        &HashMap::new(),
        &current,
    )
    .unwrap();

    let bridge = iface(&state.interfaces, "vdsmbr_test1");
    assert_eq!(bridge.state, Some(InterfaceState::Absent));
    let nb = iface(&state.interfaces, "netA");
    assert_eq!(nb.state, Some(InterfaceState::Absent));
    assert_eq!(nb.iface_type, Some(InterfaceType::OvsInterface));

    // Still an OVS batch: the mapping key is present with the literal
    // empty value, not absent.
    assert_eq!(bridge_mappings(&state), "");
}

#[test]
fn test_linux_bridge_batch_emits_no_ovn_mappings() {
    let nets = networks(&[("net1", "nic: eth0\nbridged: true")]);

    let state = generate_state(
        &nets,
        &HashMap::new(),
        &HashMap::new(),
        &HashMap::new(),
        &current_state("interfaces: []"),
    )
    .unwrap();

    assert!(state.ovsdb.is_none());
}

#[test]
fn test_vlan_network_gets_an_access_port() {
    let nets = networks(&[(
        "netA",
        r#"
        nic: eth1
        vlan: 100
        switch: ovs
        bridged: true
        "#,
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: eth1
          type: ethernet
          state: up
        "#,
    );

    let state = generate_state(
        &nets,
        &HashMap::new(),
        &HashMap::new(),
        &HashMap::new(),
        &current,
    )
    .unwrap();

    let bridge = ovs_bridge(&state);
    let port = bridge
        .bridge
        .as_ref()
        .unwrap()
        .port
        .as_ref()
        .unwrap()
        .iter()
        .find(|p| p.name == "netA")
        .unwrap();
    let vlan = port.vlan.as_ref().unwrap();
    assert_eq!(vlan.mode, Some(BridgePortVlanMode::Access));
    assert_eq!(vlan.tag, Some(100));
}

#[test]
fn test_networks_sharing_a_carrier_share_one_bridge() {
    let nets = networks(&[
        (
            "netA",
            "nic: eth0\nswitch: ovs\nbridged: true\nmtu: 1500",
        ),
        (
            "netB",
            "nic: eth0\nvlan: 100\nswitch: ovs\nbridged: true\nmtu: 9000",
        ),
    ]);
    let current = current_state(
        r#"
        interfaces:
        - name: eth0
          type: ethernet
          state: up
          mtu: 1500
        "#,
    );

    let state = generate_state(
        &nets,
        &HashMap::new(),
        &HashMap::new(),
        &HashMap::new(),
        &current,
    )
    .unwrap();

    let bridges: Vec<&Interface> = state
        .interfaces
        .iter()
        .filter(|i| i.iface_type == Some(InterfaceType::OvsBridge))
        .collect();
    assert_eq!(bridges.len(), 1);
    let port_names: Vec<&str> = bridges[0]
        .bridge
        .as_ref()
        .unwrap()
        .port
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(port_names, vec!["eth0", "netA", "netB"]);

    // The carrier satisfies its largest consumer.
    assert_eq!(iface(&state.interfaces, "eth0").mtu, Some(9000));

    let mappings = bridge_mappings(&state);
    let bridge_name = &bridges[0].name;
    assert_eq!(
        mappings,
        format!("netA:{bridge_name},netB:{bridge_name}")
    );
}

#[test]
fn test_non_managed_bridge_ports_are_preserved() {
    let nets = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let running = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: vdsmbr_test1
          type: ovs-bridge
          state: up
          bridge:
            port:
            - name: eth0
            - name: netA
            - name: tap0
        - name: eth0
          type: ethernet
          state: up
        - name: netA
          type: ovs-interface
          state: up
        "#,
    );

    let state = generate_state(
        &nets,
        &HashMap::new(),
        &running,
        &HashMap::new(),
        &current,
    )
    .unwrap();

    let port_names: Vec<&str> = ovs_bridge(&state)
        .bridge
        .as_ref()
        .unwrap()
        .port
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(port_names, vec!["eth0", "netA", "tap0"]);
}
