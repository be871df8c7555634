// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

use axon_abi::SysError;

/// Errors surfaced by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtError {
    /// Kernel rejected the call.
    Sys(SysError),
    /// The calling process no longer exists or is exiting.
    Killed,
    /// Syscall returned a negative value outside the errno range.
    BadReturn(isize),
    /// Memory access the fault handler could not resolve.
    Fault { va: usize },
}

impl RtError {
    /// `QueueFull`, `QueueEmpty` and `NotReceiving`: retry after yielding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Sys(err) if err.is_transient())
    }
}

impl From<SysError> for RtError {
    fn from(value: SysError) -> Self {
        Self::Sys(value)
    }
}

impl fmt::Display for RtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sys(err) => write!(f, "syscall failed: {err}"),
            Self::Killed => f.write_str("process killed"),
            Self::BadReturn(raw) => write!(f, "unexpected syscall return {raw}"),
            Self::Fault { va } => write!(f, "unhandled fault at {va:#x}"),
        }
    }
}

/// Result type used throughout the runtime.
pub type Result<T> = core::result::Result<T, RtError>;
