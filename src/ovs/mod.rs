// SPDX-License-Identifier: Apache-2.0

pub(crate) mod info;
pub(crate) mod network;

/// Name prefix of the OVS bridges this layer owns.
pub const BRIDGE_NAME_PREFIX: &str = "vdsmbr_";

const BRIDGE_NAME_SUFFIX_LEN: usize = 8;

/// A fresh bridge gets a random name; an existing bridge keeps its
/// name verbatim so repeated generation stays stable.
pub(crate) fn random_bridge_name() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", BRIDGE_NAME_PREFIX, &suffix[..BRIDGE_NAME_SUFFIX_LEN])
}
