// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Process table (environments) and lifecycle syscalls
//! OWNERS: @kernel-sched-team
//! PUBLIC API: EnvTable, Env, EnvSnapshot, Kernel::{create_env, exofork, env_set_status,
//!   env_set_pgfault_upcall, env_destroy, destroy_env, getenvid}
//! DEPENDS_ON: mm::AddressSpace, ipc::IpcState, trap::TrapFrame
//! INVARIANTS:
//! - Handles carry a generation; a handle stops resolving once its slot is freed.
//! - A slot is reused only after its process reached Free.
//! - Each process owns its page table exclusively.


extern crate alloc;

use alloc::vec::Vec;
use core::marker::PhantomData;

use axon_abi::env::ENV_GEN_SHIFT;
use axon_abi::layout::{PAGE_SIZE, USTACKTOP, UTEXT};
use axon_abi::{EnvId, EnvStatus, Perm, SysError};

use crate::error::KResult;
use crate::ipc::IpcState;
use crate::kernel::Kernel;
use crate::mm::AddressSpace;
use crate::trap::TrapFrame;
use crate::types::UserPage;
use crate::{log_debug, log_error, log_info};

const MAX_GENERATION: u32 = u32::MAX >> ENV_GEN_SHIFT;

/// Kernel-side process record.
pub struct Env {
    pub(crate) id: EnvId,
    pub(crate) parent: Option<EnvId>,
    pub(crate) status: EnvStatus,
    pub(crate) space: AddressSpace,
    pub(crate) frame: TrapFrame,
    pub(crate) pgfault_upcall: Option<usize>,
    pub(crate) ipc: IpcState,
    pub(crate) runs: u64,
}

impl Env {
    pub fn id(&self) -> EnvId {
        self.id
    }

    pub fn status(&self) -> EnvStatus {
        self.status
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn snapshot(&self) -> EnvSnapshot {
        EnvSnapshot {
            id: self.id,
            parent: self.parent,
            status: self.status,
            pgfault_upcall: self.pgfault_upcall,
            ipc: self.ipc,
            frame: self.frame,
            runs: self.runs,
        }
    }
}

/// Read-only copy of a process record, as user code may observe it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub id: EnvId,
    pub parent: Option<EnvId>,
    pub status: EnvStatus,
    pub pgfault_upcall: Option<usize>,
    pub ipc: IpcState,
    pub frame: TrapFrame,
    pub runs: u64,
}

struct Slot {
    last_id: EnvId,
    env: Option<Env>,
}

/// Fixed-size process arena.
pub struct EnvTable {
    slots: Vec<Slot>,
    _not_send_sync: PhantomData<*mut ()>,
}

impl EnvTable {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|slot| Slot { last_id: EnvId::new(slot, 0), env: None }).collect();
        Self { slots, _not_send_sync: PhantomData }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claims a free slot for a new `NotRunnable` process.
    pub fn alloc(&mut self, parent: Option<EnvId>, frame: TrapFrame) -> Result<EnvId, SysError> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.env.is_none())
            .ok_or(SysError::NoFreeSlot)?;
        let generation = match slot.last_id.generation() {
            g if g >= MAX_GENERATION => 1,
            g => g + 1,
        };
        let id = EnvId::new(index, generation);
        slot.last_id = id;
        slot.env = Some(Env {
            id,
            parent,
            status: EnvStatus::NotRunnable,
            space: AddressSpace::new(),
            frame,
            pgfault_upcall: None,
            ipc: IpcState::default(),
            runs: 0,
        });
        Ok(id)
    }

    /// Live process named exactly by `id`.
    pub fn get(&self, id: EnvId) -> Option<&Env> {
        self.slots.get(id.slot())?.env.as_ref().filter(|env| env.id == id)
    }

    pub fn get_mut(&mut self, id: EnvId) -> Option<&mut Env> {
        self.slots.get_mut(id.slot())?.env.as_mut().filter(|env| env.id == id)
    }

    /// Resolves a handle on behalf of `caller`.
    ///
    /// `EnvId::CURRENT` names the caller. With `check_authority` the target
    /// must be the caller or a process the caller created directly, and must
    /// not be waiting to be reaped.
    pub fn resolve(&self, caller: EnvId, target: EnvId, check_authority: bool) -> Result<EnvId, SysError> {
        let id = if target.is_current() { caller } else { target };
        let env = self.get(id).ok_or(SysError::BadTarget)?;
        if check_authority {
            if env.id != caller && env.parent != Some(caller) {
                return Err(SysError::BadTarget);
            }
            if env.status == EnvStatus::Dying {
                return Err(SysError::BadTarget);
            }
        }
        Ok(id)
    }

    /// Removes the record from its slot; the slot becomes Free.
    pub fn take(&mut self, id: EnvId) -> Option<Env> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.env.as_ref().map(|env| env.id) != Some(id) {
            return None;
        }
        slot.env.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Env> + '_ {
        self.slots.iter().filter_map(|slot| slot.env.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Env> + '_ {
        self.slots.iter_mut().filter_map(|slot| slot.env.as_mut())
    }

    /// Live process occupying `slot`, if any.
    pub fn at_slot(&self, slot: usize) -> Option<&Env> {
        self.slots.get(slot)?.env.as_ref()
    }

    pub fn live(&self) -> usize {
        self.iter().count()
    }
}

impl Kernel {
    /// Creates a runnable root process with one stack page below `USTACKTOP`.
    pub fn create_env(&mut self) -> KResult<EnvId> {
        let id = self.envs.alloc(None, TrapFrame::user(UTEXT, USTACKTOP))?;
        let stack = UserPage::new(USTACKTOP - PAGE_SIZE).ok_or(SysError::InvalidArgument)?;
        if let Err(err) = self.map_fresh_page(id, stack, Perm::RW) {
            self.destroy_env(id);
            return Err(err);
        }
        if let Some(env) = self.envs.get_mut(id) {
            env.status = EnvStatus::Runnable;
        }
        log_info!(target: "env", "created root env {}", id);
        Ok(id)
    }

    /// Creates a not-runnable child whose registers copy the caller's,
    /// with the return register zeroed.
    pub fn exofork(&mut self, caller: EnvId) -> KResult<EnvId> {
        let parent = self.envs.get(caller).ok_or(SysError::BadTarget)?;
        let mut frame = parent.frame;
        frame.set_return(0);
        let child = self.envs.alloc(Some(caller), frame)?;
        log_debug!(target: "env", "env {} exoforked {}", caller, child);
        Ok(child)
    }

    /// Sets `Runnable` or `NotRunnable`; other states are not settable.
    pub fn env_set_status(&mut self, caller: EnvId, target: EnvId, status: EnvStatus) -> KResult<()> {
        if !matches!(status, EnvStatus::Runnable | EnvStatus::NotRunnable) {
            return Err(SysError::InvalidArgument.into());
        }
        let id = self.envs.resolve(caller, target, true)?;
        let env = self.envs.get_mut(id).ok_or(SysError::BadTarget)?;
        // Only a sender may wake a receiver.
        if env.ipc.recving && status == EnvStatus::Runnable {
            return Err(SysError::InvalidArgument.into());
        }
        env.status = status;
        Ok(())
    }

    pub fn env_set_pgfault_upcall(&mut self, caller: EnvId, target: EnvId, entry: usize) -> KResult<()> {
        let id = self.envs.resolve(caller, target, true)?;
        let env = self.envs.get_mut(id).ok_or(SysError::BadTarget)?;
        env.pgfault_upcall = Some(entry);
        Ok(())
    }

    /// Destroys `target`. A process destroying itself is marked `Dying`
    /// and reaped at the next scheduling decision.
    pub fn env_destroy(&mut self, caller: EnvId, target: EnvId) -> KResult<()> {
        let id = self.envs.resolve(caller, target, true)?;
        if id == caller {
            if let Some(env) = self.envs.get_mut(id) {
                env.status = EnvStatus::Dying;
                env.ipc = IpcState::default();
            }
            log_info!(target: "env", "env {} exiting", id);
            return Ok(());
        }
        log_info!(target: "env", "env {} destroying {}", caller, id);
        self.destroy_env(id);
        Ok(())
    }

    /// Frees `id` and everything it maps.
    pub fn destroy_env(&mut self, id: EnvId) {
        let Some(mut env) = self.envs.take(id) else {
            return;
        };
        if let Err(err) = env.space.teardown(&mut self.frames) {
            log_error!(target: "env", "teardown of env {} failed: {}", id, err);
        }
        if self.sched.current() == Some(id) {
            self.sched.clear_current();
        }
        log_debug!(target: "env", "env {} freed", id);
    }

    pub fn getenvid(&self, caller: EnvId) -> KResult<EnvId> {
        Ok(self.envs.get(caller).ok_or(SysError::BadTarget)?.id)
    }

    /// Read-only record of any live process.
    pub fn env(&self, id: EnvId) -> Option<EnvSnapshot> {
        self.envs.get(id).map(Env::snapshot)
    }
}
