// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy returned across the syscall boundary.

use core::fmt;

/// Errors visible to user code.
///
/// Encoded on the register ABI as the negated discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SysError {
    /// Handle invalid, or the caller lacks authority over the target.
    BadTarget = 2,
    /// Malformed address, length or permission.
    InvalidArgument = 3,
    /// Physical page or page-table growth exhausted.
    OutOfMemory = 4,
    /// Process table has no free slot.
    NoFreeSlot = 5,
    /// IPC send against a process not blocked in `recv`.
    NotReceiving = 7,
    /// Transmit ring has no recyclable descriptor; retry later.
    QueueFull = 16,
    /// Receive ring holds no completed descriptor; retry later.
    QueueEmpty = 17,
    /// No network device is attached.
    NoDevice = 18,
}

impl SysError {
    /// Negative register encoding of this error.
    pub const fn errno(self) -> isize {
        -(self as i32 as isize)
    }

    /// Decodes a negative register value; `None` for non-errors and unknown codes.
    pub const fn from_errno(value: isize) -> Option<Self> {
        match -value {
            2 => Some(Self::BadTarget),
            3 => Some(Self::InvalidArgument),
            4 => Some(Self::OutOfMemory),
            5 => Some(Self::NoFreeSlot),
            7 => Some(Self::NotReceiving),
            16 => Some(Self::QueueFull),
            17 => Some(Self::QueueEmpty),
            18 => Some(Self::NoDevice),
            _ => None,
        }
    }

    /// Errors callers are expected to retry after yielding.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::QueueFull | Self::QueueEmpty | Self::NotReceiving)
    }
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BadTarget => "bad target process",
            Self::InvalidArgument => "invalid argument",
            Self::OutOfMemory => "out of memory",
            Self::NoFreeSlot => "out of process slots",
            Self::NotReceiving => "target not receiving",
            Self::QueueFull => "transmit queue full",
            Self::QueueEmpty => "receive queue empty",
            Self::NoDevice => "no such device",
        };
        f.write_str(text)
    }
}
