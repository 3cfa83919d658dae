// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    iface::{BridgePortConfig, Interface, InterfaceType, DEFAULT_MTU},
    ip::{is_ipv6_link_local, netmask_from_prefix, network_contains},
    route::{AddressFamily, RouteEntry},
    CurrentState, NetstateError, NetworkAttributes, NetworkConfig,
    SwitchType,
};

const NO_GATEWAY: &str = "";
const NO_IPV6_GATEWAY: &str = "::";

/// Read-only indices over the current state relating northbound
/// networks, their southbound carriers and the OVS bridges in between.
/// Rebuilt fresh on every call; never mutated by consumers.
#[derive(Debug, Default)]
pub(crate) struct OvsInfo {
    pub(crate) nb_by_sb: HashMap<String, HashSet<String>>,
    pub(crate) bridge_by_sb: HashMap<String, String>,
    pub(crate) ports_by_bridge: HashMap<String, Vec<BridgePortConfig>>,
    pub(crate) port_by_name: HashMap<String, BridgePortConfig>,
}

impl OvsInfo {
    pub(crate) fn new(
        running_networks: &HashMap<String, NetworkConfig>,
        current: &CurrentState,
    ) -> Self {
        let mut info = Self::default();
        for (name, net) in running_networks
            .iter()
            .filter(|(_, n)| n.switch == SwitchType::Ovs && !n.remove)
        {
            if let Some(sb) = net.base_iface() {
                info.nb_by_sb
                    .entry(sb.to_string())
                    .or_default()
                    .insert(name.clone());
            }
        }
        for (bridge_name, bridge) in current
            .interfaces
            .iter()
            .filter(|(_, i)| i.iface_type == Some(InterfaceType::OvsBridge))
        {
            let ports = bridge
                .bridge
                .as_ref()
                .and_then(|b| b.port.clone())
                .unwrap_or_default();
            if let Some(sb_port) = ports
                .iter()
                .find(|port| is_southbound_device(&port.name, current))
            {
                info.bridge_by_sb
                    .insert(sb_port.name.clone(), bridge_name.clone());
            }
            for port in &ports {
                info.port_by_name
                    .insert(port.name.clone(), port.clone());
            }
            info.ports_by_bridge.insert(bridge_name.clone(), ports);
        }
        info
    }
}

// The southbound port of a bridge is its only NIC or bond member; the
// other ports are northbound (OVS-internal) interfaces.
fn is_southbound_device(name: &str, current: &CurrentState) -> bool {
    matches!(
        current.interfaces.get(name).and_then(|i| i.iface_type),
        Some(InterfaceType::Ethernet) | Some(InterfaceType::Bond)
    )
}

/// Legacy-shaped report of the OVS networks on this host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct NetInfoReport {
    pub networks: BTreeMap<String, NetworkReportEntry>,
    pub vlans: BTreeMap<String, VlanReportEntry>,
    pub bondings: BTreeMap<String, DeviceReportEntry>,
    pub nics: BTreeMap<String, DeviceReportEntry>,
    pub bridges: BTreeMap<String, BridgeReportEntry>,
}

/// IP facts shared by the network entry and the base-device entry it
/// is back-filled onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ReportIpInfo {
    pub addr: String,
    pub netmask: String,
    pub ipv4addrs: Vec<String>,
    pub gateway: String,
    pub ipv4defaultroute: bool,
    pub dhcpv4: bool,
    pub ipv6addrs: Vec<String>,
    pub ipv6gateway: String,
    pub ipv6autoconf: bool,
    pub dhcpv6: bool,
}

impl Default for ReportIpInfo {
    fn default() -> Self {
        Self {
            addr: String::new(),
            netmask: String::new(),
            ipv4addrs: Vec::new(),
            gateway: NO_GATEWAY.to_string(),
            ipv4defaultroute: false,
            dhcpv4: false,
            ipv6addrs: Vec::new(),
            ipv6gateway: NO_IPV6_GATEWAY.to_string(),
            ipv6autoconf: false,
            dhcpv6: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct NetworkReportEntry {
    pub iface: String,
    pub bridged: bool,
    pub southbound: String,
    pub ports: Vec<String>,
    pub stp: bool,
    pub switch: SwitchType,
    pub mtu: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlanid: Option<u16>,
    #[serde(flatten)]
    pub ip: ReportIpInfo,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct VlanReportEntry {
    pub iface: String,
    pub vlanid: u16,
    pub mtu: u64,
    #[serde(flatten)]
    pub ip: ReportIpInfo,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeviceReportEntry {
    pub mtu: u64,
    #[serde(flatten)]
    pub ip: ReportIpInfo,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct BridgeReportEntry {
    pub ports: Vec<String>,
    pub stp: bool,
}

/// Reverse translation: reconstruct the legacy report for every OVS
/// network from the previously persisted config and the current state.
/// OVS networks come out shaped like Linux-bridge ones, with
/// synthesized VLAN and bridge entries where the legacy schema expects
/// them.
pub fn ovs_netinfo(
    running_networks: &HashMap<String, NetworkAttributes>,
    current: &CurrentState,
) -> Result<NetInfoReport, NetstateError> {
    let mut report = NetInfoReport::default();
    let mut confs: Vec<NetworkConfig> = Vec::new();
    for (name, attrs) in running_networks {
        confs.push(NetworkConfig::new(name, attrs)?);
    }
    confs.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    let conf_map: HashMap<String, NetworkConfig> = confs
        .iter()
        .map(|conf| (conf.name.clone(), conf.clone()))
        .collect();
    let ovs_info = OvsInfo::new(&conf_map, current);

    for net in confs
        .iter()
        .filter(|n| n.switch == SwitchType::Ovs && !n.remove)
    {
        let sb = match net.base_iface() {
            Some(sb) => sb.to_string(),
            None => continue,
        };
        // The live port state is the source of truth for the access
        // tag; the persisted config fills in when the port is not up
        // yet.
        let vlan_tag = ovs_info
            .port_by_name
            .get(&net.name)
            .and_then(|port| port.vlan.as_ref())
            .and_then(|vlan| vlan.tag)
            .or(net.vlan);
        let southbound = match vlan_tag {
            Some(tag) => format!("{sb}.{tag}"),
            None => sb.clone(),
        };
        let iface_name = if net.bridged {
            net.name.clone()
        } else {
            southbound.clone()
        };
        let mtu = current.mtu(&net.name).unwrap_or(DEFAULT_MTU);
        let ip = report_ip_info(
            current.interfaces.get(&net.name),
            &net.name,
            current,
        );

        report.networks.insert(
            net.name.clone(),
            NetworkReportEntry {
                iface: iface_name,
                bridged: net.bridged,
                southbound: southbound.clone(),
                ports: vec![southbound.clone()],
                // STP is not tracked for OVS networks.
                stp: false,
                switch: SwitchType::Ovs,
                mtu,
                vlanid: vlan_tag,
                ip: ip.clone(),
            },
        );

        if net.bridged {
            report.bridges.insert(
                net.name.clone(),
                BridgeReportEntry {
                    ports: vec![southbound.clone()],
                    stp: false,
                },
            );
        }
        match vlan_tag {
            Some(tag) => {
                report.vlans.insert(
                    southbound.clone(),
                    VlanReportEntry {
                        iface: sb.clone(),
                        vlanid: tag,
                        mtu,
                        ip: ip.clone(),
                    },
                );
            }
            None => {
                let entry = DeviceReportEntry { mtu, ip: ip.clone() };
                if current.interfaces.get(&sb).and_then(|i| i.iface_type)
                    == Some(InterfaceType::Bond)
                {
                    report.bondings.insert(sb.clone(), entry);
                } else {
                    report.nics.insert(sb.clone(), entry);
                }
            }
        }
    }
    Ok(report)
}

fn report_ip_info(
    iface: Option<&Interface>,
    next_hop_iface: &str,
    current: &CurrentState,
) -> ReportIpInfo {
    let mut info = ReportIpInfo::default();
    let iface = match iface {
        Some(iface) => iface,
        None => return info,
    };

    let ipv4_addrs: Vec<(String, u8)> = iface
        .ipv4
        .as_ref()
        .and_then(|ip| ip.addresses.as_ref())
        .map(|addrs| {
            addrs
                .iter()
                .map(|a| (a.ip.clone(), a.prefix_length))
                .collect()
        })
        .unwrap_or_default();
    info.ipv4addrs = ipv4_addrs
        .iter()
        .map(|(ip, prefix)| format!("{ip}/{prefix}"))
        .collect();
    let gateway = detect_gateway(
        AddressFamily::IPv4,
        next_hop_iface,
        &current.routes,
    );
    if let Some(gateway) = gateway.as_deref() {
        info.gateway = gateway.to_string();
        info.ipv4defaultroute = true;
    }
    if let Some((addr, prefix)) =
        select_primary_address(&ipv4_addrs, gateway.as_deref())
    {
        info.addr = addr;
        info.netmask = netmask_from_prefix(prefix);
    }
    info.dhcpv4 = iface
        .ipv4
        .as_ref()
        .map(|ip| ip.enabled && ip.dhcp == Some(true))
        .unwrap_or(false);

    info.ipv6addrs = iface
        .ipv6
        .as_ref()
        .and_then(|ip| ip.addresses.as_ref())
        .map(|addrs| {
            addrs
                .iter()
                .filter(|a| !is_ipv6_link_local(&a.ip))
                .map(|a| format!("{}/{}", a.ip, a.prefix_length))
                .collect()
        })
        .unwrap_or_default();
    if let Some(gateway) = detect_gateway(
        AddressFamily::IPv6,
        next_hop_iface,
        &current.routes,
    ) {
        info.ipv6gateway = gateway;
    }
    info.dhcpv6 = iface
        .ipv6
        .as_ref()
        .map(|ip| ip.enabled && ip.dhcp == Some(true))
        .unwrap_or(false);
    info.ipv6autoconf = iface
        .ipv6
        .as_ref()
        .map(|ip| ip.enabled && ip.autoconf == Some(true))
        .unwrap_or(false);
    info
}

// A default route qualifies only on the family's default destination,
// in the main table and through the examined interface. More than one
// distinct next hop is ambiguous and degrades to "no gateway".
fn detect_gateway(
    family: AddressFamily,
    next_hop_iface: &str,
    routes: &[RouteEntry],
) -> Option<String> {
    let mut gateways: Vec<&str> = routes
        .iter()
        .filter(|r| {
            r.destination.as_deref() == Some(family.default_destination())
                && r.effective_table_id()
                    == RouteEntry::USE_DEFAULT_ROUTE_TABLE
                && r.next_hop_iface.as_deref() == Some(next_hop_iface)
        })
        .filter_map(|r| r.next_hop_addr.as_deref())
        .collect();
    gateways.sort_unstable();
    gateways.dedup();
    match gateways.as_slice() {
        [gateway] => Some(gateway.to_string()),
        [] => None,
        _ => {
            log::warn!(
                "Ambiguous gateways {gateways:?} on {next_hop_iface}, \
                reporting none"
            );
            None
        }
    }
}

// One address: take it. Addresses but no gateway: take the first.
// Otherwise the address whose network contains the gateway wins; no
// containment match reports no primary address.
fn select_primary_address(
    addrs: &[(String, u8)],
    gateway: Option<&str>,
) -> Option<(String, u8)> {
    match (addrs, gateway) {
        ([], _) => None,
        ([single], _) => Some(single.clone()),
        (many, None) => many.first().cloned(),
        (many, Some(gateway)) => many
            .iter()
            .find(|(ip, prefix)| {
                network_contains(&format!("{ip}/{prefix}"), gateway)
            })
            .cloned(),
    }
}
