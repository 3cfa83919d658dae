// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidArgument,
    PluginFailure,
    Bug,
}

impl Default for ErrorKind {
    fn default() -> Self {
        Self::Bug
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct NetstateError {
    kind: ErrorKind,
    msg: String,
}

impl NetstateError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl std::fmt::Display for NetstateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl Error for NetstateError {}

impl From<serde_json::Error> for NetstateError {
    fn from(e: serde_json::Error) -> Self {
        NetstateError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid property: {e}"),
        )
    }
}

impl From<std::net::AddrParseError> for NetstateError {
    fn from(e: std::net::AddrParseError) -> Self {
        NetstateError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid IP address: {e}"),
        )
    }
}
