// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::{
    Interface, NetworkState, RouteEntry, RouteRuleEntry,
};

/// Read-only snapshot of the manager's reported state, indexed for the
/// builders. Routes and DNS come from the running view; rules only
/// exist as config in the manager's schema.
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct CurrentState {
    pub interfaces: HashMap<String, Interface>,
    pub dns_servers: Vec<String>,
    pub routes: Vec<RouteEntry>,
    pub rules: Vec<RouteRuleEntry>,
}

impl CurrentState {
    pub fn new(state: &NetworkState) -> Self {
        let interfaces = state
            .interfaces
            .iter()
            .map(|iface| (iface.name.clone(), iface.clone()))
            .collect();
        let dns_servers = state
            .dns
            .as_ref()
            .and_then(|dns| dns.running.as_ref())
            .and_then(|running| running.server.clone())
            .unwrap_or_default();
        let routes = state
            .routes
            .as_ref()
            .and_then(|routes| routes.running.clone())
            .unwrap_or_default();
        let rules = state
            .rules
            .as_ref()
            .and_then(|rules| rules.config.clone())
            .unwrap_or_default();
        Self {
            interfaces,
            dns_servers,
            routes,
            rules,
        }
    }

    pub fn filtered_interfaces(
        &self,
        names: &[&str],
    ) -> HashMap<String, &Interface> {
        self.interfaces
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .map(|(name, iface)| (name.clone(), iface))
            .collect()
    }

    /// MAC address of a device, used to carry the southbound MAC onto
    /// an OVS northbound interface.
    pub fn mac_address(&self, iface_name: &str) -> Option<&str> {
        self.interfaces
            .get(iface_name)
            .and_then(|iface| iface.mac_address.as_deref())
    }

    pub(crate) fn mtu(&self, iface_name: &str) -> Option<u64> {
        self.interfaces.get(iface_name).and_then(|iface| iface.mtu)
    }

    pub(crate) fn is_up(&self, iface_name: &str) -> bool {
        self.interfaces
            .get(iface_name)
            .map(Interface::is_up)
            .unwrap_or(false)
    }
}

impl From<&NetworkState> for CurrentState {
    fn from(state: &NetworkState) -> Self {
        Self::new(state)
    }
}
