// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Syscall numbers.
//!
//! Arguments travel in five registers; the result is a non-negative value
//! or a negated [`crate::SysError`].

pub const SYS_GETENVID: usize = 0;
pub const SYS_YIELD: usize = 1;
pub const SYS_ENV_DESTROY: usize = 2;
/// Creates a not-runnable copy of the caller's register state.
pub const SYS_EXOFORK: usize = 3;
pub const SYS_ENV_SET_STATUS: usize = 4;
pub const SYS_ENV_SET_PGFAULT_UPCALL: usize = 5;
pub const SYS_PAGE_ALLOC: usize = 6;
pub const SYS_PAGE_MAP: usize = 7;
pub const SYS_PAGE_UNMAP: usize = 8;
/// Downgrades a write-eligible page to copy-on-write and shares it with a second space.
pub const SYS_PAGE_SHARE_COW: usize = 9;
pub const SYS_IPC_TRY_SEND: usize = 10;
/// Blocks the caller; no direct return on success.
pub const SYS_IPC_RECV: usize = 11;
pub const SYS_NET_TRY_TRANSMIT: usize = 12;
pub const SYS_NET_TRY_RECEIVE: usize = 13;

/// Number of syscall slots.
pub const SYSCALL_COUNT: usize = 14;
/// Registers available for arguments.
pub const ARG_REGS: usize = 5;
