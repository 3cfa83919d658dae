// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::NetworkConfig;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
/// DNS resolver state of the whole document.
pub struct DnsResolverState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<DnsClientState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<DnsClientState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DnsClientState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<String>>,
}

/// Per-network nameserver opinion.
///
/// The three results are distinct on the wire: `None` means "no
/// opinion, inherit whatever is configured", `Some(vec![])` means
/// "explicitly clear the nameservers", and a non-empty list replaces
/// them. Only the default-route network may set nameservers; a network
/// that just lost default-route ownership clears them so stale servers
/// do not outlive the gateway they came with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Dns {
    state: Option<Vec<String>>,
    auto_dns: bool,
}

impl Dns {
    pub(crate) fn new(
        net: &NetworkConfig,
        running: Option<&NetworkConfig>,
    ) -> Self {
        let state = Self::nameserver_state(net, running);
        let auto_dns = net.default_route
            && !net.remove
            && state.as_deref().map(<[String]>::is_empty).unwrap_or(true);
        Self { state, auto_dns }
    }

    fn nameserver_state(
        net: &NetworkConfig,
        running: Option<&NetworkConfig>,
    ) -> Option<Vec<String>> {
        if net.default_route && !net.remove {
            Some(net.nameservers.clone())
        } else if running
            .map(|r| r.default_route && !r.nameservers.is_empty())
            .unwrap_or(false)
        {
            Some(Vec::new())
        } else {
            None
        }
    }

    pub(crate) fn into_state(self) -> Option<Vec<String>> {
        self.state
    }

    /// Whether DHCP-provided nameservers should be accepted: the
    /// network owns the default route but states no nameservers of its
    /// own.
    pub(crate) fn auto_dns(&self) -> bool {
        self.auto_dns
    }
}
