// SPDX-License-Identifier: Apache-2.0

use crate::{
    ovs_netinfo,
    unit_tests::testlib::{current_state, networks},
    SwitchType,
};

#[test]
fn test_primary_address_follows_the_gateway_network() {
    let running = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: netA
          type: ovs-interface
          state: up
          mtu: 1500
          ipv4:
            enabled: true
            dhcp: false
            address:
            - ip: 10.0.0.5
              prefix-length: 24
            - ip: 10.0.1.5
              prefix-length: 24
        - name: eth0
          type: ethernet
          state: up
        routes:
          running:
          - destination: 0.0.0.0/0
            next-hop-address: 10.0.0.1
            next-hop-interface: netA
            table-id: 254
        "#,
    );

    let report = ovs_netinfo(&running, &current).unwrap();

    let net = &report.networks["netA"];
    assert_eq!(net.ip.addr, "10.0.0.5");
    assert_eq!(net.ip.netmask, "255.255.255.0");
    assert_eq!(net.ip.gateway, "10.0.0.1");
    assert!(net.ip.ipv4defaultroute);
    assert_eq!(
        net.ip.ipv4addrs,
        vec!["10.0.0.5/24".to_string(), "10.0.1.5/24".to_string()]
    );
    assert_eq!(net.switch, SwitchType::Ovs);
    assert!(!net.stp);
    assert_eq!(net.iface, "netA");
    assert_eq!(net.southbound, "eth0");
}

#[test]
fn test_source_route_tables_do_not_count_as_default_route() {
    let running = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: netA
          type: ovs-interface
          state: up
          ipv4:
            enabled: true
            address:
            - ip: 10.0.0.5
              prefix-length: 24
        - name: eth0
          type: ethernet
          state: up
        routes:
          running:
          - destination: 0.0.0.0/0
            next-hop-address: 10.0.0.1
            next-hop-interface: netA
            table-id: 66322802
        "#,
    );

    let report = ovs_netinfo(&running, &current).unwrap();

    let net = &report.networks["netA"];
    assert!(!net.ip.ipv4defaultroute);
    assert_eq!(net.ip.gateway, "");
    // One address: it is primary regardless of any gateway.
    assert_eq!(net.ip.addr, "10.0.0.5");
}

#[test]
fn test_ambiguous_gateways_degrade_to_none() {
    let running = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: netA
          type: ovs-interface
          state: up
          ipv4:
            enabled: true
            address:
            - ip: 10.0.0.5
              prefix-length: 24
            - ip: 10.0.1.5
              prefix-length: 24
        - name: eth0
          type: ethernet
          state: up
        routes:
          running:
          - destination: 0.0.0.0/0
            next-hop-address: 10.0.0.1
            next-hop-interface: netA
            table-id: 254
          - destination: 0.0.0.0/0
            next-hop-address: 10.0.1.1
            next-hop-interface: netA
            table-id: 254
        "#,
    );

    let report = ovs_netinfo(&running, &current).unwrap();

    let net = &report.networks["netA"];
    assert_eq!(net.ip.gateway, "");
    assert!(!net.ip.ipv4defaultroute);
    // No usable gateway: fall back to the first address.
    assert_eq!(net.ip.addr, "10.0.0.5");
}

#[test]
fn test_vlan_network_synthesizes_vlan_and_bridge_entries() {
    let running = networks(&[(
        "netA",
        "nic: eth0\nvlan: 100\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: netA
          type: ovs-interface
          state: up
          mtu: 9000
        - name: eth0
          type: ethernet
          state: up
        "#,
    );

    let report = ovs_netinfo(&running, &current).unwrap();

    let net = &report.networks["netA"];
    assert_eq!(net.southbound, "eth0.100");
    assert_eq!(net.vlanid, Some(100));
    assert_eq!(net.mtu, 9000);
    assert_eq!(net.ports, vec!["eth0.100".to_string()]);

    let vlan = &report.vlans["eth0.100"];
    assert_eq!(vlan.iface, "eth0");
    assert_eq!(vlan.vlanid, 100);
    assert_eq!(vlan.mtu, 9000);

    let bridge = &report.bridges["netA"];
    assert_eq!(bridge.ports, vec!["eth0.100".to_string()]);
    assert!(!bridge.stp);
}

#[test]
fn test_bond_carrier_lands_in_the_bondings_section() {
    let running = networks(&[(
        "netA",
        "bonding: bond0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: netA
          type: ovs-interface
          state: up
          mtu: 1500
        - name: bond0
          type: bond
          state: up
        "#,
    );

    let report = ovs_netinfo(&running, &current).unwrap();

    assert!(report.bondings.contains_key("bond0"));
    assert!(!report.nics.contains_key("bond0"));
}

#[test]
fn test_link_local_ipv6_addresses_are_filtered() {
    let running = networks(&[(
        "netA",
        "nic: eth0\nswitch: ovs\nbridged: true",
    )]);
    let current = current_state(
        r#"
        interfaces:
        - name: netA
          type: ovs-interface
          state: up
          ipv6:
            enabled: true
            autoconf: true
            dhcp: false
            address:
            - ip: fe80::1
              prefix-length: 64
            - ip: 2001:db8::5
              prefix-length: 64
        - name: eth0
          type: ethernet
          state: up
        "#,
    );

    let report = ovs_netinfo(&running, &current).unwrap();

    let net = &report.networks["netA"];
    assert_eq!(net.ip.ipv6addrs, vec!["2001:db8::5/64".to_string()]);
    assert!(net.ip.ipv6autoconf);
    assert!(!net.ip.dhcpv6);
    assert_eq!(net.ip.ipv6gateway, "::");
}

#[test]
fn test_linux_bridge_networks_are_not_reported() {
    let running = networks(&[("net1", "nic: eth0\nbridged: true")]);

    let report =
        ovs_netinfo(&running, &current_state("interfaces: []")).unwrap();

    assert!(report.networks.is_empty());
}
