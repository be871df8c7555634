// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use axon_abi::EnvId;
use axon_rt::RtError;
use thiserror::Error;

/// Errors that stop a packet loop.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NetIoError {
    /// Runtime or kernel call failed.
    #[error("runtime error: {0}")]
    Runtime(RtError),
    /// Transient failures persisted past the configured budget.
    #[error("gave up after {0} retries")]
    RetriesExhausted(u32),
}

impl From<RtError> for NetIoError {
    fn from(err: RtError) -> Self {
        Self::Runtime(err)
    }
}

/// Reasons an output request is dropped without stopping the loop.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    #[error("request from {0}, expected the protocol engine")]
    Sender(EnvId),
    #[error("request value {0} is not an output request")]
    Request(u32),
    #[error("request carried no page")]
    NoPage,
    #[error("frame length {0} exceeds an Ethernet frame")]
    Length(u32),
}
