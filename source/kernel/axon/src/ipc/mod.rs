// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Rendezvous IPC: one word plus an optional page, no queueing
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: IpcState, Kernel::{ipc_recv, ipc_try_send}
//! DEPENDS_ON: task::EnvTable, mm::AddressSpace
//! INVARIANTS:
//! - `recving` is set only by `ipc_recv` and cleared only by a successful send (or teardown).
//! - The page is mapped into the receiver before it becomes runnable.
//! - A failed send leaves the receiver untouched.

#[cfg(test)]
mod tests;

use axon_abi::{EnvId, EnvStatus, Perm, SysError};

use crate::error::KResult;
use crate::kernel::Kernel;
use crate::log_trace;
use crate::mm::check_grant;
use crate::types::{PageArg, UserPage};

/// Rendezvous sub-record of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpcState {
    /// Blocked in `recv` and not yet served.
    pub recving: bool,
    /// Where a transferred page lands; `None` when no page is wanted.
    pub dst: Option<UserPage>,
    /// Sender of the last delivered message.
    pub from: EnvId,
    pub value: u32,
    /// Permissions of the transferred page; empty when none was transferred.
    pub perm: Perm,
}

impl Default for IpcState {
    fn default() -> Self {
        Self { recving: false, dst: None, from: EnvId::CURRENT, value: 0, perm: Perm::empty() }
    }
}

impl Kernel {
    /// Blocks `caller` until a sender serves it.
    ///
    /// On return the caller is `NotRunnable`; its return register is written
    /// by the sender.
    pub fn ipc_recv(&mut self, caller: EnvId, dst: PageArg) -> KResult<()> {
        let env = self.envs.get_mut(caller).ok_or(SysError::BadTarget)?;
        env.ipc.recving = true;
        env.ipc.dst = dst.page();
        env.status = EnvStatus::NotRunnable;
        log_trace!(target: "ipc", "env {} waiting (page {:?})", caller, env.ipc.dst);
        Ok(())
    }

    /// Delivers `value`, and the page at `src` if both sides want one.
    ///
    /// Never blocks: a target not waiting in `recv` yields `NotReceiving`.
    /// Any process may send to any other; no authority check applies.
    pub fn ipc_try_send(&mut self, caller: EnvId, target: EnvId, value: u32, src: PageArg, perm: Perm) -> KResult<()> {
        self.envs.get(caller).ok_or(SysError::BadTarget)?;
        let id = self.envs.resolve(caller, target, false)?;
        let receiver = self.envs.get(id).ok_or(SysError::BadTarget)?;
        if !receiver.ipc.recving {
            return Err(SysError::NotReceiving.into());
        }
        let dst = receiver.ipc.dst;

        let mut granted = Perm::empty();
        if let Some(src) = src.page() {
            let perm = Perm::from_user(perm.bits()).ok_or(SysError::InvalidArgument)?;
            let sender = self.envs.get(caller).ok_or(SysError::BadTarget)?;
            let mapping = sender.space.lookup(src).ok_or(SysError::InvalidArgument)?;
            check_grant(mapping.perm, perm)?;
            if let Some(dst) = dst {
                let receiver = self.envs.get_mut(id).ok_or(SysError::BadTarget)?;
                receiver.space.insert(&mut self.frames, dst, mapping.frame, perm)?;
                granted = perm;
            }
        }

        let receiver = self.envs.get_mut(id).ok_or(SysError::BadTarget)?;
        receiver.ipc.recving = false;
        receiver.ipc.from = caller;
        receiver.ipc.value = value;
        receiver.ipc.perm = granted;
        receiver.frame.set_return(0);
        receiver.status = EnvStatus::Runnable;
        log_trace!(target: "ipc", "env {} -> {} value={} perm={:?}", caller, id, value, granted);
        Ok(())
    }
}
