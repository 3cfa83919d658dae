// SPDX-License-Identifier: Apache-2.0

mod api;
mod bond;
mod current_state;
mod dns;
mod error;
mod iface;
mod ip;
mod linux_bridge;
mod net_state;
mod netconf;
mod ovs;
mod route;
mod route_rule;
mod sriov;
mod state;

#[cfg(test)]
mod unit_tests;

pub use crate::api::{
    generate_dynamic_source_route_state, generate_state, get_current_state,
    remove_dynamic_source_route_state, setup, NmstateClient,
};
pub use crate::current_state::CurrentState;
pub use crate::dns::{DnsClientState, DnsResolverState};
pub use crate::error::{ErrorKind, NetstateError};
pub use crate::iface::{
    BondConfig, BridgeConfig, BridgeOptions, BridgePortConfig,
    BridgePortVlanConfig, BridgePortVlanMode, BridgeStpOptions,
    EthernetConfig, Interface, InterfaceState, InterfaceType, SrIovConfig,
    VlanConfig,
};
pub use crate::ip::{InterfaceIpAddr, InterfaceIpv4, InterfaceIpv6};
pub use crate::net_state::{
    NetworkState, OvsDbGlobalConfig, OVN_BRIDGE_MAPPINGS_KEY,
};
pub use crate::netconf::{
    BondAttributes, NetworkAttributes, NetworkConfig, SwitchType,
};
pub use crate::ovs::info::{
    ovs_netinfo, BridgeReportEntry, DeviceReportEntry, NetInfoReport,
    NetworkReportEntry, ReportIpInfo, VlanReportEntry,
};
pub use crate::ovs::BRIDGE_NAME_PREFIX;
pub use crate::route::{
    generate_table_id, RouteEntry, RouteState, Routes,
};
pub use crate::route_rule::{RouteRuleEntry, RouteRuleState, RouteRules};
pub use crate::sriov::generate_sriov_state;
