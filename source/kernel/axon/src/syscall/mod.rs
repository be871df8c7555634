// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Syscall dispatcher and error handling
//! OWNERS: @kernel-team
//! PUBLIC API: SyscallTable, Args, Handler, SyscallOutcome, Kernel::syscall
//! DEPENDS_ON: syscall::api, axon-abi (numbers, errno)
//! INVARIANTS: Fixed SYSCALL_COUNT window; stable IDs; decode/check/execute discipline;
//!   the return register is written for every call except a blocking `recv`

pub mod api;


use axon_abi::syscall::{self as nr, ARG_REGS, SYSCALL_COUNT};
use axon_abi::{EnvId, EnvStatus, SysError};

use crate::error::Error;
use crate::kernel::Kernel;
use crate::{log_debug, log_error};

pub use api::Context;

/// Result type used by syscall handlers.
pub type SysResult<T> = Result<T, Error>;

/// Syscall arguments passed in registers.
#[derive(Default, Clone, Copy, Debug)]
pub struct Args {
    regs: [usize; ARG_REGS],
}

impl Args {
    /// Creates a new argument pack from the provided registers.
    pub const fn new(regs: [usize; ARG_REGS]) -> Self {
        Self { regs }
    }

    /// Returns the raw register at `index`.
    pub fn get(&self, index: usize) -> usize {
        self.regs[index]
    }
}

/// What the trap path does after a syscall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// Value placed in the caller's return register.
    Return(isize),
    /// Caller blocked; its return register is written when it is woken.
    Blocked,
    /// Caller was terminated.
    Killed,
}

/// Type alias for a syscall handler.
pub type Handler = fn(&mut Context<'_>, &Args) -> SysResult<usize>;

/// Table mapping syscall numbers to handlers.
#[derive(Clone, Copy)]
pub struct SyscallTable {
    handlers: [Option<Handler>; SYSCALL_COUNT],
}

impl Default for SyscallTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SyscallTable {
    /// Creates an empty table.
    pub const fn new() -> Self {
        Self { handlers: [None; SYSCALL_COUNT] }
    }

    /// Table with every kernel syscall installed.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(nr::SYS_GETENVID, api::sys_getenvid);
        table.register(nr::SYS_YIELD, api::sys_yield);
        table.register(nr::SYS_ENV_DESTROY, api::sys_env_destroy);
        table.register(nr::SYS_EXOFORK, api::sys_exofork);
        table.register(nr::SYS_ENV_SET_STATUS, api::sys_env_set_status);
        table.register(nr::SYS_ENV_SET_PGFAULT_UPCALL, api::sys_env_set_pgfault_upcall);
        table.register(nr::SYS_PAGE_ALLOC, api::sys_page_alloc);
        table.register(nr::SYS_PAGE_MAP, api::sys_page_map);
        table.register(nr::SYS_PAGE_UNMAP, api::sys_page_unmap);
        table.register(nr::SYS_PAGE_SHARE_COW, api::sys_page_share_cow);
        table.register(nr::SYS_IPC_TRY_SEND, api::sys_ipc_try_send);
        table.register(nr::SYS_IPC_RECV, api::sys_ipc_recv);
        table.register(nr::SYS_NET_TRY_TRANSMIT, api::sys_net_try_transmit);
        table.register(nr::SYS_NET_TRY_RECEIVE, api::sys_net_try_receive);
        table
    }

    /// Registers a handler for the given syscall number.
    pub fn register(&mut self, number: usize, handler: Handler) {
        if let Some(slot) = self.handlers.get_mut(number) {
            *slot = Some(handler);
        }
    }

    /// Dispatches a syscall by number.
    pub fn dispatch(&self, number: usize, ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
        let handler = self
            .handlers
            .get(number)
            .copied()
            .flatten()
            .ok_or(SysError::InvalidArgument)?;
        handler(ctx, args)
    }
}

impl Kernel {
    /// Register ABI entry: runs syscall `number` on behalf of `caller`.
    pub fn syscall(&mut self, caller: EnvId, number: usize, args: Args) -> SyscallOutcome {
        match self.envs.get(caller) {
            Some(env) if env.status() != EnvStatus::Dying => {}
            _ => return SyscallOutcome::Killed,
        }
        let table = self.table;
        let result = table.dispatch(number, &mut Context::new(self, caller), &args);
        let ret = match result {
            Ok(value) => {
                #[cfg(feature = "debug_pt_verify")]
                if let Err(v) = self.check_invariants() {
                    log_error!(target: "syscall", "env {} syscall {} left {}; destroying", caller, number, v);
                    self.destroy_env(caller);
                    return SyscallOutcome::Killed;
                }
                value as isize
            }
            Err(Error::Sys(err)) => {
                log_debug!(target: "syscall", "env {} syscall {} -> {}", caller, number, err);
                err.errno()
            }
            Err(Error::Blocked) => return SyscallOutcome::Blocked,
            Err(Error::Violation(v)) => {
                log_error!(target: "syscall", "env {} syscall {} violated {}; destroying", caller, number, v);
                self.destroy_env(caller);
                return SyscallOutcome::Killed;
            }
        };
        if let Some(env) = self.envs.get_mut(caller) {
            env.frame.set_return(ret as u32);
        }
        SyscallOutcome::Return(ret)
    }
}
