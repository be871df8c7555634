// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Saved register state and page-fault upcall delivery
//! OWNERS: @kernel-team
//! PUBLIC API: TrapFrame, Kernel::{page_fault, upcall_return}, FaultOutcome
//! INVARIANTS:
//! - Faults are delivered only on the process's own exception stack page.
//! - A process without upcall, or whose exception stack is unusable, is destroyed.

use axon_abi::layout::{UXSTACK, UXSTACKTOP};
use axon_abi::trapframe::{GP_REGS, REG_RET};
use axon_abi::{EnvId, SysError, UTrapFrame};

use crate::kernel::Kernel;
use crate::mm::{AddressSpaceView, AddressSpaceViewMut, PageFault};
use crate::{log_info, log_warn};

/// Register snapshot of a process that is not running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub regs: [u32; GP_REGS],
    pub pc: u32,
    pub flags: u32,
    pub sp: u32,
}

impl TrapFrame {
    /// Frame for a fresh process entering at `pc` with stack `sp`.
    pub fn user(pc: usize, sp: usize) -> Self {
        Self { pc: pc as u32, sp: sp as u32, flags: 0x202, ..Self::default() }
    }

    pub fn set_return(&mut self, value: u32) {
        self.regs[REG_RET] = value;
    }

    pub fn return_value(&self) -> u32 {
        self.regs[REG_RET]
    }
}

/// Result of raising a page fault in a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultOutcome {
    /// Process resumes at `entry` with the fault frame at `frame_va`.
    Upcall { entry: usize, frame_va: usize },
    /// Fault was fatal; the process is gone.
    Destroyed,
}

const STACK_GAP: usize = 4;

impl Kernel {
    /// Raises `fault` in `env` and prepares the upcall.
    pub fn page_fault(&mut self, env: EnvId, fault: PageFault) -> FaultOutcome {
        let Some(proc) = self.envs.get(env) else {
            return FaultOutcome::Destroyed;
        };
        let Some(entry) = proc.pgfault_upcall else {
            log_warn!(
                target: "trap",
                "env {} fault va={:#x} code={:?} with no upcall; map: {}",
                env,
                fault.va,
                fault.code,
                proc.space.dump()
            );
            self.kill(env);
            return FaultOutcome::Destroyed;
        };
        let sp = proc.frame.sp as usize;
        // A fault taken inside the handler stacks below the current frame.
        let top = if (UXSTACK..UXSTACKTOP).contains(&sp) { sp - STACK_GAP } else { UXSTACKTOP };
        let Some(frame_va) = top.checked_sub(UTrapFrame::SIZE).filter(|va| *va >= UXSTACK) else {
            log_warn!(target: "trap", "env {} exception stack overflow", env);
            self.kill(env);
            return FaultOutcome::Destroyed;
        };
        let utf = UTrapFrame {
            fault_va: fault.va as u32,
            err: fault.code.bits(),
            regs: proc.frame.regs,
            pc: proc.frame.pc,
            flags: proc.frame.flags,
            sp: proc.frame.sp,
        };
        let pushed = AddressSpaceViewMut::new(&proc.space, &mut self.frames).write(frame_va, &utf.to_le_bytes());
        if let Err(denied) = pushed {
            log_warn!(target: "trap", "env {} exception stack unusable at {:#x}", env, denied.va);
            self.kill(env);
            return FaultOutcome::Destroyed;
        }
        if let Some(proc) = self.envs.get_mut(env) {
            proc.frame.sp = frame_va as u32;
            proc.frame.pc = entry as u32;
        }
        FaultOutcome::Upcall { entry, frame_va }
    }

    /// Resumes the interrupted context saved by the last [`Kernel::page_fault`].
    pub fn upcall_return(&mut self, env: EnvId) -> Result<(), SysError> {
        let proc = self.envs.get_mut(env).ok_or(SysError::BadTarget)?;
        let frame_va = proc.frame.sp as usize;
        if !(UXSTACK..UXSTACKTOP).contains(&frame_va) {
            return Err(SysError::InvalidArgument);
        }
        let mut bytes = [0u8; UTrapFrame::SIZE];
        AddressSpaceView::new(&proc.space, &self.frames)
            .read(frame_va, &mut bytes)
            .map_err(|_| SysError::InvalidArgument)?;
        let utf = UTrapFrame::from_le_bytes(&bytes);
        proc.frame = TrapFrame { regs: utf.regs, pc: utf.pc, flags: utf.flags, sp: utf.sp };
        Ok(())
    }

    fn kill(&mut self, env: EnvId) {
        log_info!(target: "trap", "destroying env {} after fatal fault", env);
        self.destroy_env(env);
    }
}
