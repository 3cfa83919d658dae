// SPDX-License-Identifier: Apache-2.0

mod ip;
mod ovs;
mod ovs_info;
mod state;
