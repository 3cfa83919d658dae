// SPDX-License-Identifier: Apache-2.0

use crate::{
    iface::{EthernetConfig, Interface, InterfaceState, SrIovConfig},
    NetworkState,
};

/// Request document setting the number of virtual functions on one
/// SR-IOV capable device.
pub fn generate_sriov_state(device: &str, num_vfs: u32) -> NetworkState {
    let iface = Interface {
        name: device.to_string(),
        state: Some(InterfaceState::Up),
        ethernet: Some(EthernetConfig {
            sr_iov: Some(SrIovConfig {
                total_vfs: Some(num_vfs),
            }),
        }),
        ..Default::default()
    };
    NetworkState {
        interfaces: vec![iface],
        ..Default::default()
    }
}
