// SPDX-License-Identifier: Apache-2.0

use crate::{
    state::NetworkingState,
    unit_tests::testlib::current_state,
    BondConfig, Interface, InterfaceState, InterfaceType, InterfaceIpv4,
};

fn iface<'a>(interfaces: &'a [Interface], name: &str) -> &'a Interface {
    interfaces
        .iter()
        .find(|i| i.name == name)
        .unwrap_or_else(|| panic!("interface {name} missing"))
}

#[test]
fn test_vlan_mtu_is_propagated_to_its_base() {
    let current = current_state(
        r#"
        interfaces:
        - name: eth0
          type: ethernet
          state: up
          mtu: 1500
        - name: eth0.100
          type: vlan
          state: up
          mtu: 9000
          vlan:
            base-iface: eth0
            id: 100
        "#,
    );
    let mut state = NetworkingState::new();

    state.update_mtu(true, &current);
    let doc = state.state();

    assert_eq!(iface(&doc.interfaces, "eth0").mtu, Some(9000));
}

#[test]
fn test_vlan_mtu_pass_only_runs_for_linux_bridge_batches() {
    let current = current_state(
        r#"
        interfaces:
        - name: eth0
          type: ethernet
          state: up
          mtu: 1500
        - name: eth0.100
          type: vlan
          state: up
          mtu: 9000
          vlan:
            base-iface: eth0
            id: 100
        "#,
    );
    let mut state = NetworkingState::new();

    state.update_mtu(false, &current);
    let doc = state.state();

    assert!(doc.interfaces.is_empty());
}

#[test]
fn test_vlan_scheduled_for_removal_is_ignored() {
    let current = current_state(
        r#"
        interfaces:
        - name: eth0
          type: ethernet
          state: up
          mtu: 1500
        - name: eth0.100
          type: vlan
          state: up
          mtu: 9000
          vlan:
            base-iface: eth0
            id: 100
        "#,
    );
    let mut state = NetworkingState::new();
    state.add_interface(Interface::new_absent(
        "eth0.100",
        InterfaceType::Vlan,
    ));

    state.update_mtu(true, &current);
    let doc = state.state();

    assert_eq!(iface(&doc.interfaces, "eth0.100").mtu, None);
    assert!(doc.interfaces.iter().all(|i| i.name != "eth0"));
}

#[test]
fn test_bond_mtu_is_propagated_to_slaves() {
    let current = current_state(
        r#"
        interfaces:
        - name: eth2
          type: ethernet
          state: up
          mtu: 1500
        - name: eth3
          type: ethernet
          state: up
          mtu: 1500
        "#,
    );
    let mut state = NetworkingState::new();
    let mut bond = Interface::new_up("bond0");
    bond.iface_type = Some(InterfaceType::Bond);
    bond.mtu = Some(9000);
    bond.bond = Some(BondConfig {
        mode: None,
        options: None,
        port: Some(vec!["eth2".to_string(), "eth3".to_string()]),
    });
    state.add_interface(bond);
    let mut slave = Interface::new_up("eth3");
    slave.mtu = Some(1400);
    state.add_interface(slave);

    state.update_mtu(false, &current);
    let doc = state.state();

    let synthesized = iface(&doc.interfaces, "eth2");
    assert_eq!(synthesized.mtu, Some(9000));
    assert_eq!(synthesized.state, Some(InterfaceState::Up));
    // The slave keeps the larger of both requests.
    assert_eq!(iface(&doc.interfaces, "eth3").mtu, Some(9000));
}

#[test]
fn test_removed_bond_resets_slave_mtu() {
    let current = current_state(
        r#"
        interfaces:
        - name: bond0
          type: bond
          state: up
          mtu: 9000
          link-aggregation:
            mode: balance-rr
            port:
            - eth2
        - name: eth2
          type: ethernet
          state: up
          mtu: 9000
        "#,
    );
    let mut state = NetworkingState::new();
    state
        .add_interface(Interface::new_absent("bond0", InterfaceType::Bond));

    state.update_mtu(false, &current);
    let doc = state.state();

    assert_eq!(iface(&doc.interfaces, "eth2").mtu, Some(1500));
}

#[test]
fn test_slave_matching_the_bond_mtu_is_left_alone() {
    let current = current_state(
        r#"
        interfaces:
        - name: bond0
          type: bond
          state: up
          mtu: 1500
          link-aggregation:
            mode: balance-rr
            port:
            - eth2
        - name: eth2
          type: ethernet
          state: up
          mtu: 1500
        "#,
    );
    let mut state = NetworkingState::new();

    state.update_mtu(false, &current);
    let doc = state.state();

    assert!(doc.interfaces.iter().all(|i| i.name != "eth2"));
}

#[test]
fn test_bond_fields_layer_under_network_fields() {
    let mut state = NetworkingState::new();
    let mut from_network = Interface::new_up("bond0");
    from_network.mtu = Some(9000);
    from_network.ipv4 = Some(InterfaceIpv4 {
        enabled: true,
        dhcp: Some(true),
        ..Default::default()
    });
    state.add_interface(from_network);

    let mut bond = Interface::new_up("bond0");
    bond.iface_type = Some(InterfaceType::Bond);
    bond.bond = Some(BondConfig {
        mode: Some("balance-rr".to_string()),
        options: None,
        port: Some(vec!["eth0".to_string()]),
    });
    bond.ipv4 = Some(InterfaceIpv4::disabled());
    state.add_bond_states(vec![bond]);

    let doc = state.state();
    let merged = iface(&doc.interfaces, "bond0");
    assert_eq!(merged.iface_type, Some(InterfaceType::Bond));
    assert_eq!(merged.mtu, Some(9000));
    // The network's IP survives the layering, the disabled stack of
    // the bond fragment does not replace it.
    assert!(merged.ipv4.as_ref().unwrap().enabled);
    assert_eq!(
        merged.bond.as_ref().unwrap().mode.as_deref(),
        Some("balance-rr")
    );
}

#[test]
fn test_absent_bond_replaces_previous_fragment() {
    let mut state = NetworkingState::new();
    let mut from_network = Interface::new_up("bond0");
    from_network.mtu = Some(9000);
    state.add_interface(from_network);

    state.add_bond_states(vec![Interface::new_absent(
        "bond0",
        InterfaceType::Bond,
    )]);

    let doc = state.state();
    let bond = iface(&doc.interfaces, "bond0");
    assert!(bond.is_absent());
    assert_eq!(bond.mtu, None);
}

#[test]
fn test_interfaces_are_sorted_and_dns_is_flattened() {
    let mut state = NetworkingState::new();
    state.add_interface(Interface::new_up("zz0"));
    state.add_interface(Interface::new_up("aa0"));
    state.add_dns("net1", vec!["1.1.1.1".to_string()]);
    state.add_dns("net2", vec!["2.2.2.2".to_string()]);

    let doc = state.state();

    let names: Vec<&str> =
        doc.interfaces.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["aa0", "zz0"]);
    assert_eq!(
        doc.dns.unwrap().config.unwrap().server,
        Some(vec!["1.1.1.1".to_string(), "2.2.2.2".to_string()])
    );
    assert!(doc.routes.is_none());
    assert!(doc.rules.is_none());
    assert!(doc.ovsdb.is_none());
}
