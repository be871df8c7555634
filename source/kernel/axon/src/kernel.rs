// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kernel state and boot.

extern crate alloc;

use alloc::collections::BTreeMap;
use core::marker::PhantomData;

use axon_abi::{EnvStatus, Perm};
use net_e1000::E1000;
use static_assertions::assert_not_impl_any;

use crate::config::{BootError, KernelConfig};
use crate::error::Violation;
use crate::mm::{FrameId, FrameTable};
use crate::net::Nic;
use crate::sched::Scheduler;
use crate::syscall::SyscallTable;
use crate::task::EnvTable;
use crate::log_info;

/// Single-processor kernel. Syscall bodies run to completion; nothing here
/// is shared across threads.
pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) frames: FrameTable,
    pub(crate) envs: EnvTable,
    pub(crate) sched: Scheduler,
    pub(crate) nic: Option<Nic>,
    pub(crate) table: SyscallTable,
    _not_send_sync: PhantomData<*mut ()>,
}

assert_not_impl_any!(Kernel: Send, Sync);

impl Kernel {
    pub fn boot(config: KernelConfig) -> Result<Self, BootError> {
        config.validate()?;
        let nic = match config.nic {
            Some(nic_config) => {
                let nic = E1000::simulated(nic_config)?;
                log_info!(
                    target: "net",
                    "e1000 attached: tx={} rx={} mac={:02x?}",
                    nic.tx_capacity(),
                    nic.rx_capacity(),
                    nic.mac()
                );
                Some(nic)
            }
            None => None,
        };
        log_info!(target: "kernel", "boot: {} frames, {} env slots", config.frames, config.max_envs);
        Ok(Self {
            config,
            frames: FrameTable::new(config.frames),
            envs: EnvTable::new(config.max_envs),
            sched: Scheduler::new(),
            nic,
            table: SyscallTable::standard(),
            _not_send_sync: PhantomData,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn envs(&self) -> &EnvTable {
        &self.envs
    }

    /// Makes the next frame allocation fail.
    #[cfg(feature = "failpoints")]
    pub fn fail_next_frame_alloc(&mut self) {
        self.frames.fail_next_alloc();
    }

    /// Audits refcounts and IPC state across all processes.
    pub fn check_invariants(&self) -> Result<(), Violation> {
        let mut refs: BTreeMap<FrameId, u32> = BTreeMap::new();
        for env in self.envs.iter() {
            if env.ipc.recving && env.status == EnvStatus::Runnable {
                return Err(Violation::RecvingWhileRunnable { env: env.id });
            }
            for (page, mapping) in env.space.mappings() {
                if mapping.perm.contains(Perm::WRITABLE | Perm::COW) {
                    return Err(Violation::WritableCow { env: env.id, va: page.addr() });
                }
                if !self.frames.is_allocated(mapping.frame) {
                    return Err(Violation::FrameNotAllocated { frame: mapping.frame.to_raw() });
                }
                *refs.entry(mapping.frame).or_default() += 1;
            }
            for table in env.space.table_frames() {
                *refs.entry(table).or_default() += 1;
            }
        }
        for (frame, count) in self.frames.allocated() {
            let mappings = refs.get(&frame).copied().unwrap_or(0);
            if count == 0 {
                return Err(Violation::LeakedFrame { frame: frame.to_raw() });
            }
            if count != mappings {
                return Err(Violation::RefcountMismatch { frame: frame.to_raw(), refs: count, mappings });
            }
        }
        Ok(())
    }
}
