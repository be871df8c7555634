// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Process-bound syscall wrappers and user-memory access
//! OWNERS: @runtime
//! PUBLIC API: Sys (syscalls, read/write, peek/poke, mappings/query, thisenv)
//! DEPENDS_ON: axon (register ABI, address-space view, snapshots)
//! INVARIANTS:
//! - Every kernel service is reached through `Kernel::syscall`; memory through the view.
//! - A fault during `read`/`write` is delivered to the registered upcall before the access is retried.

extern crate alloc;

use alloc::vec::Vec;

use axon::mm::PageFault;
use axon::types::UserPage;
use axon::{Args, EnvSnapshot, FaultOutcome, Kernel, SyscallOutcome};
use axon_abi::layout::UTOP;
use axon_abi::syscall::{self as nr, ARG_REGS};
use axon_abi::trapframe::UTrapFrame;
use axon_abi::{EnvId, EnvStatus, Perm, SysError};

use crate::error::{Result, RtError};
use crate::fork::upcall_handler;

/// The machine as seen by one running process.
pub struct Sys<'k> {
    kernel: &'k mut Kernel,
    me: EnvId,
}

fn env_arg(id: EnvId) -> usize {
    id.to_raw() as usize
}

fn perm_arg(perm: Perm) -> usize {
    perm.bits() as usize
}

fn page_arg(va: Option<usize>) -> usize {
    va.unwrap_or(UTOP)
}

impl<'k> Sys<'k> {
    pub fn new(kernel: &'k mut Kernel, me: EnvId) -> Self {
        Self { kernel, me }
    }

    /// Handle of the running process.
    pub fn id(&self) -> EnvId {
        self.me
    }

    fn call(&mut self, number: usize, regs: &[usize]) -> Result<usize> {
        let mut raw = [0usize; ARG_REGS];
        raw[..regs.len()].copy_from_slice(regs);
        match self.kernel.syscall(self.me, number, Args::new(raw)) {
            SyscallOutcome::Return(value) if value >= 0 => Ok(value as usize),
            SyscallOutcome::Return(value) => {
                Err(SysError::from_errno(value).map_or(RtError::BadReturn(value), RtError::Sys))
            }
            SyscallOutcome::Blocked => Ok(0),
            SyscallOutcome::Killed => Err(RtError::Killed),
        }
    }

    pub fn getenvid(&mut self) -> Result<EnvId> {
        self.call(nr::SYS_GETENVID, &[]).map(|raw| EnvId::from_raw(raw as u32))
    }

    pub fn yield_now(&mut self) -> Result<()> {
        self.call(nr::SYS_YIELD, &[]).map(drop)
    }

    pub fn env_destroy(&mut self, target: EnvId) -> Result<()> {
        self.call(nr::SYS_ENV_DESTROY, &[env_arg(target)]).map(drop)
    }

    /// Creates a not-runnable child with an empty address space.
    pub fn exofork(&mut self) -> Result<EnvId> {
        self.call(nr::SYS_EXOFORK, &[]).map(|raw| EnvId::from_raw(raw as u32))
    }

    pub fn env_set_status(&mut self, target: EnvId, status: EnvStatus) -> Result<()> {
        self.call(nr::SYS_ENV_SET_STATUS, &[env_arg(target), status.to_raw() as usize]).map(drop)
    }

    pub fn env_set_pgfault_upcall(&mut self, target: EnvId, entry: usize) -> Result<()> {
        self.call(nr::SYS_ENV_SET_PGFAULT_UPCALL, &[env_arg(target), entry]).map(drop)
    }

    pub fn page_alloc(&mut self, target: EnvId, va: usize, perm: Perm) -> Result<()> {
        self.call(nr::SYS_PAGE_ALLOC, &[env_arg(target), va, perm_arg(perm)]).map(drop)
    }

    pub fn page_map(&mut self, src: EnvId, src_va: usize, dst: EnvId, dst_va: usize, perm: Perm) -> Result<()> {
        self.call(nr::SYS_PAGE_MAP, &[env_arg(src), src_va, env_arg(dst), dst_va, perm_arg(perm)]).map(drop)
    }

    pub fn page_unmap(&mut self, target: EnvId, va: usize) -> Result<()> {
        self.call(nr::SYS_PAGE_UNMAP, &[env_arg(target), va]).map(drop)
    }

    /// Shares a writable page copy-on-write and downgrades the source.
    pub fn page_share_cow(&mut self, src: EnvId, src_va: usize, dst: EnvId, dst_va: usize) -> Result<()> {
        self.call(nr::SYS_PAGE_SHARE_COW, &[env_arg(src), src_va, env_arg(dst), dst_va]).map(drop)
    }

    /// One delivery attempt; `NotReceiving` comes back as an error.
    pub fn ipc_try_send(&mut self, target: EnvId, value: u32, page: Option<usize>, perm: Perm) -> Result<()> {
        let regs = [env_arg(target), value as usize, page_arg(page), perm_arg(perm)];
        self.call(nr::SYS_IPC_TRY_SEND, &regs).map(drop)
    }

    /// Arms a receive. Returns once the process is blocked; the message is
    /// read from [`Sys::thisenv`] after the process is woken.
    pub fn ipc_recv(&mut self, dst: Option<usize>) -> Result<()> {
        self.call(nr::SYS_IPC_RECV, &[page_arg(dst)]).map(drop)
    }

    pub fn net_try_transmit(&mut self, va: usize, len: usize) -> Result<()> {
        self.call(nr::SYS_NET_TRY_TRANSMIT, &[va, len]).map(drop)
    }

    /// Receives into `[va, va + capacity)`; the frame length is stored at `len_va`.
    pub fn net_try_receive(&mut self, va: usize, capacity: usize, len_va: usize) -> Result<()> {
        self.call(nr::SYS_NET_TRY_RECEIVE, &[va, capacity, len_va]).map(drop)
    }

    /// Read-only record of the running process.
    pub fn thisenv(&self) -> Result<EnvSnapshot> {
        self.kernel.env(self.me).ok_or(RtError::Killed)
    }

    /// Present pages of the running process and their permissions.
    pub fn mappings(&self) -> Result<Vec<(UserPage, Perm)>> {
        Ok(self.kernel.view(self.me).map_err(|_| RtError::Killed)?.mappings())
    }

    /// Permissions of the mapping covering `va`.
    pub fn query(&self, va: usize) -> Result<Option<Perm>> {
        Ok(self.kernel.view(self.me).map_err(|_| RtError::Killed)?.query(va).map(|m| m.perm))
    }

    /// Reads without fault delivery.
    pub fn peek(&self, va: usize, buf: &mut [u8]) -> Result<()> {
        let view = self.kernel.view(self.me).map_err(|_| RtError::Killed)?;
        view.read(va, buf).map_err(|fault| RtError::Fault { va: fault.va })
    }

    /// Writes without fault delivery.
    pub fn poke(&mut self, va: usize, data: &[u8]) -> Result<()> {
        let mut view = self.kernel.view_mut(self.me).map_err(|_| RtError::Killed)?;
        view.write(va, data).map_err(|fault| RtError::Fault { va: fault.va })
    }

    /// Reads user memory, running the fault upcall on a denied access.
    pub fn read(&mut self, va: usize, buf: &mut [u8]) -> Result<()> {
        let mut last = None;
        loop {
            let view = self.kernel.view(self.me).map_err(|_| RtError::Killed)?;
            match view.read(va, buf) {
                Ok(()) => return Ok(()),
                Err(fault) => self.retry_after(fault, &mut last)?,
            }
        }
    }

    /// Writes user memory, running the fault upcall on a denied access.
    pub fn write(&mut self, va: usize, data: &[u8]) -> Result<()> {
        let mut last = None;
        loop {
            let mut view = self.kernel.view_mut(self.me).map_err(|_| RtError::Killed)?;
            match view.write(va, data) {
                Ok(()) => return Ok(()),
                Err(fault) => self.retry_after(fault, &mut last)?,
            }
        }
    }

    // A handler that returns without fixing the page would fault forever.
    fn retry_after(&mut self, fault: PageFault, last: &mut Option<usize>) -> Result<()> {
        if *last == Some(fault.va) {
            log::warn!("env {} fault at {:#x} persists after upcall", self.me, fault.va);
            self.exit();
            return Err(RtError::Fault { va: fault.va });
        }
        *last = Some(fault.va);
        self.deliver_fault(fault)
    }

    /// Raises `fault`, runs the upcall handler and resumes.
    fn deliver_fault(&mut self, fault: PageFault) -> Result<()> {
        let frame_va = match self.kernel.page_fault(self.me, fault) {
            FaultOutcome::Destroyed => return Err(RtError::Killed),
            FaultOutcome::Upcall { entry, frame_va } => match upcall_handler(entry) {
                Some(handler) => {
                    let frame = self.trap_frame(frame_va)?;
                    if let Err(err) = handler(self, &frame) {
                        log::warn!("env {} fault at {:#x} not recoverable: {}", self.me, fault.va, err);
                        self.exit();
                        return Err(RtError::Fault { va: fault.va });
                    }
                    frame_va
                }
                None => {
                    log::warn!("env {} upcall {:#x} is not a handler", self.me, entry);
                    self.exit();
                    return Err(RtError::Fault { va: fault.va });
                }
            },
        };
        log::trace!("env {} resumes from frame {:#x}", self.me, frame_va);
        self.kernel.upcall_return(self.me).map_err(RtError::Sys)
    }

    fn trap_frame(&self, frame_va: usize) -> Result<UTrapFrame> {
        let mut bytes = [0u8; UTrapFrame::SIZE];
        self.peek(frame_va, &mut bytes)?;
        Ok(UTrapFrame::from_le_bytes(&bytes))
    }

    /// Destroys the running process; it is reaped at the next scheduling decision.
    pub fn exit(&mut self) {
        if let Err(err) = self.env_destroy(EnvId::CURRENT) {
            log::debug!("env {} exit: {}", self.me, err);
        }
    }
}
