// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};

use crate::{
    iface::{BondConfig, Interface, InterfaceState, InterfaceType},
    BondAttributes, InterfaceIpv4, InterfaceIpv6,
};

const BOND_MODE_OPTION: &str = "mode";

// Kernel bonding mode numbers and their symbolic names.
const BOND_MODES: [(&str, &str); 7] = [
    ("0", "balance-rr"),
    ("1", "active-backup"),
    ("2", "balance-xor"),
    ("3", "broadcast"),
    ("4", "802.3ad"),
    ("5", "balance-tlb"),
    ("6", "balance-alb"),
];

/// Builds the interface fragment of one legacy bonding entry.
pub(crate) struct Bond<'a> {
    name: &'a str,
    attrs: &'a BondAttributes,
    is_new: bool,
}

impl<'a> Bond<'a> {
    pub(crate) fn new(
        name: &'a str,
        attrs: &'a BondAttributes,
        running_bonds: &HashMap<String, BondAttributes>,
    ) -> Self {
        let is_new = !attrs.remove && !running_bonds.contains_key(name);
        Self {
            name,
            attrs,
            is_new,
        }
    }

    pub(crate) fn interface_state(&self) -> Interface {
        if self.attrs.remove {
            return Interface::new_absent(self.name, InterfaceType::Bond);
        }
        let mut iface = Interface {
            name: self.name.to_string(),
            iface_type: Some(InterfaceType::Bond),
            state: Some(InterfaceState::Up),
            mac_address: self.attrs.hwaddr.clone(),
            bond: Some(self.bond_config()),
            ..Default::default()
        };
        if self.is_new {
            // A bond with no network attached yet must not bring up an
            // IP stack on its own; a network sharing the fragment
            // overrides this during aggregation.
            iface.ipv4 = Some(InterfaceIpv4::disabled());
            iface.ipv6 = Some(InterfaceIpv6::disabled());
        }
        iface
    }

    fn bond_config(&self) -> BondConfig {
        let mut options = parse_bond_options(
            self.attrs.options.as_deref().unwrap_or_default(),
        );
        let mode = options
            .remove(BOND_MODE_OPTION)
            .map(|mode| translate_bond_mode(&mode));
        let mut ports = self.attrs.nics.clone();
        ports.sort_unstable();
        BondConfig {
            mode,
            options: if options.is_empty() {
                None
            } else {
                Some(
                    options
                        .into_iter()
                        .map(|(key, value)| {
                            (key, serde_json::Value::String(value))
                        })
                        .collect(),
                )
            },
            port: Some(ports),
        }
    }
}

pub(crate) fn generate_state(
    bondings: &HashMap<String, BondAttributes>,
    running_bonds: &HashMap<String, BondAttributes>,
) -> Vec<Interface> {
    let mut names: Vec<&String> = bondings.keys().collect();
    names.sort_unstable();
    names
        .into_iter()
        .map(|name| {
            Bond::new(name, &bondings[name], running_bonds).interface_state()
        })
        .collect()
}

fn parse_bond_options(options: &str) -> BTreeMap<String, String> {
    options
        .split_whitespace()
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// A purely numeric mode is mapped to its symbolic name, a symbolic
/// name passes through unchanged.
fn translate_bond_mode(mode: &str) -> String {
    BOND_MODES
        .iter()
        .find(|(number, _)| *number == mode)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| mode.to_string())
}
