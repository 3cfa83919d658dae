// SPDX-License-Identifier: Apache-2.0

use crate::{
    generate_table_id,
    ip::{
        netmask_from_prefix, prefix_from_netmask, IpAddress,
    },
    unit_tests::testlib::net_conf,
    InterfaceIpAddr, InterfaceIpv4, InterfaceIpv6, RouteEntry,
};

#[test]
fn test_prefix_from_netmask() {
    assert_eq!(prefix_from_netmask("255.255.255.0").unwrap(), 24);
    assert_eq!(prefix_from_netmask("255.255.255.252").unwrap(), 30);
    assert_eq!(prefix_from_netmask("255.0.0.0").unwrap(), 8);
    assert_eq!(prefix_from_netmask("0.0.0.0").unwrap(), 0);
    assert!(prefix_from_netmask("not-a-mask").is_err());
}

#[test]
fn test_netmask_from_prefix() {
    assert_eq!(netmask_from_prefix(24), "255.255.255.0");
    assert_eq!(netmask_from_prefix(30), "255.255.255.252");
    assert_eq!(netmask_from_prefix(0), "0.0.0.0");
    assert_eq!(netmask_from_prefix(32), "255.255.255.255");
}

#[test]
fn test_static_ipv4_state() {
    let net = net_conf(
        "net1",
        r#"
        nic: eth0
        bridged: false
        ipaddr: 192.0.2.5
        netmask: 255.255.255.0
        "#,
    );

    let ipv4 = IpAddress::new(&net, false).ipv4_state().unwrap();

    assert!(ipv4.enabled);
    assert_eq!(ipv4.dhcp, Some(false));
    assert_eq!(
        ipv4.addresses,
        Some(vec![InterfaceIpAddr::new("192.0.2.5".to_string(), 24)])
    );
    assert_eq!(ipv4.auto_dns, None);
}

#[test]
fn test_dhcpv4_state_of_default_route_network() {
    let net = net_conf(
        "net1",
        r#"
        nic: eth0
        bridged: false
        bootproto: dhcp
        defaultRoute: true
        "#,
    );

    let ipv4 = IpAddress::new(&net, true).ipv4_state().unwrap();

    assert!(ipv4.enabled);
    assert_eq!(ipv4.dhcp, Some(true));
    assert_eq!(ipv4.auto_dns, Some(true));
    assert_eq!(ipv4.auto_gateway, Some(true));
    assert_eq!(ipv4.auto_routes, Some(true));
    assert_eq!(
        ipv4.auto_table_id,
        Some(RouteEntry::USE_DEFAULT_ROUTE_TABLE)
    );
}

#[test]
fn test_dhcpv4_state_of_non_default_route_network() {
    let net = net_conf(
        "net1",
        r#"
        nic: eth0
        bridged: false
        bootproto: dhcp
        "#,
    );

    let ipv4 = IpAddress::new(&net, false).ipv4_state().unwrap();

    assert_eq!(ipv4.auto_dns, Some(false));
    assert_eq!(ipv4.auto_table_id, Some(generate_table_id("eth0")));
}

#[test]
fn test_no_ipv4_config_disables_the_family() {
    let net = net_conf("net1", "nic: eth0\nbridged: false");

    let ipv4 = IpAddress::new(&net, false).ipv4_state().unwrap();

    assert_eq!(ipv4, InterfaceIpv4::disabled());
    assert!(!ipv4.enabled);
}

#[test]
fn test_static_ipv6_state() {
    let net = net_conf(
        "net1",
        r#"
        nic: eth0
        bridged: false
        ipv6addr: 2001:db8:1::5/64
        "#,
    );

    let ipv6 = IpAddress::new(&net, false).ipv6_state().unwrap();

    assert!(ipv6.enabled);
    assert_eq!(ipv6.dhcp, Some(false));
    assert_eq!(ipv6.autoconf, Some(false));
    assert_eq!(
        ipv6.addresses,
        Some(vec![InterfaceIpAddr::new("2001:db8:1::5".to_string(), 64)])
    );
}

#[test]
fn test_dynamic_ipv6_state() {
    let net = net_conf(
        "net1",
        r#"
        nic: eth0
        bridged: false
        dhcpv6: true
        ipv6autoconf: true
        defaultRoute: true
        "#,
    );

    let ipv6 = IpAddress::new(&net, true).ipv6_state().unwrap();

    assert!(ipv6.enabled);
    assert_eq!(ipv6.dhcp, Some(true));
    assert_eq!(ipv6.autoconf, Some(true));
    assert_eq!(ipv6.auto_dns, Some(true));
    assert_eq!(
        ipv6.auto_table_id,
        Some(RouteEntry::USE_DEFAULT_ROUTE_TABLE)
    );
}

#[test]
fn test_no_ipv6_config_disables_the_family() {
    let net = net_conf("net1", "nic: eth0\nbridged: false");

    let ipv6 = IpAddress::new(&net, false).ipv6_state().unwrap();

    assert_eq!(ipv6, InterfaceIpv6::disabled());
}

#[test]
fn test_static_ipv4_without_netmask_is_an_error() {
    let net = net_conf(
        "net1",
        r#"
        nic: eth0
        bridged: false
        ipaddr: 192.0.2.5
        "#,
    );

    assert!(IpAddress::new(&net, false).ipv4_state().is_err());
}
