// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Round-robin scheduler over the process table
//! OWNERS: @kernel-sched-team
//! PUBLIC API: Scheduler, Kernel::{schedule_next, yield_now, current}
//! INVARIANTS: Only Runnable processes are picked; Dying processes are reaped before picking
//! NOTE: Callers rely only on the Runnable/NotRunnable contract, not on pick order.

use alloc::vec::Vec;

use axon_abi::{EnvId, EnvStatus};

use crate::kernel::Kernel;
use crate::log_trace;
use crate::task::EnvTable;

/// Round-robin cursor over process slots.
#[derive(Debug, Default)]
pub struct Scheduler {
    current: Option<EnvId>,
    last_slot: Option<usize>,
    switches: u64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self { current: None, last_slot: None, switches: 0 }
    }

    pub fn current(&self) -> Option<EnvId> {
        self.current
    }

    pub(crate) fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// Next runnable process after the last one picked, wrapping around.
    pub fn pick(&mut self, envs: &EnvTable) -> Option<EnvId> {
        let n = envs.capacity();
        let start = self.last_slot.map_or(0, |slot| slot + 1);
        let next = (0..n)
            .map(|i| (start + i) % n)
            .filter_map(|slot| envs.at_slot(slot))
            .find(|env| env.status() == EnvStatus::Runnable)
            .map(|env| env.id());
        if let Some(id) = next {
            self.last_slot = Some(id.slot());
            self.switches += 1;
        }
        self.current = next;
        next
    }
}

impl Kernel {
    /// Reaps exiting processes and picks the next one to run.
    pub fn schedule_next(&mut self) -> Option<EnvId> {
        let dying: Vec<EnvId> =
            self.envs.iter().filter(|env| env.status() == EnvStatus::Dying).map(|env| env.id()).collect();
        for id in dying {
            self.destroy_env(id);
        }
        let next = self.sched.pick(&self.envs)?;
        if let Some(env) = self.envs.get_mut(next) {
            env.runs += 1;
        }
        log_trace!(target: "sched", "switch to {}", next);
        Some(next)
    }

    /// Gives up the processor; the caller stays runnable.
    pub fn yield_now(&mut self, caller: EnvId) {
        if self.sched.current() == Some(caller) {
            self.sched.clear_current();
        }
    }

    pub fn current(&self) -> Option<EnvId> {
        self.sched.current()
    }
}
