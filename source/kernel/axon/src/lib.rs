// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), forbid(clippy::unwrap_used))]

//! CONTEXT: axon kernel core: page ownership, address spaces, processes, rendezvous IPC, NIC syscalls
//! OWNERS: @kernel-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: unit tests per module, proptest (mm), tests/basic.rs
//!
//! PUBLIC API:
//! - `Kernel`: boot, process lifecycle, mapping service, IPC, fault delivery, scheduling
//! - `Kernel::syscall`: register ABI entry point
//! - `mm::AddressSpaceView{,Mut}`: the only path to user memory
//!
//! DEPENDS_ON: axon-abi (ABI values), net-e1000 (NIC), axon-hal (register window)
//! INVARIANTS:
//! - A frame's refcount equals the number of page-table entries and tables referencing it.
//! - `recving` implies NotRunnable.
//! - Resource exhaustion is a returned error; only `Violation`s terminate a process.

extern crate alloc;

pub mod config;
pub mod diag;
pub mod error;
pub mod ipc;
pub mod kernel;
pub mod mm;
pub mod net;
pub mod sched;
pub mod syscall;
pub mod task;
pub mod trap;
pub mod types;

pub use diag::log;

pub use config::{BootError, ConfigError, KernelConfig};
pub use error::{Error, KResult, Violation};
pub use kernel::Kernel;
pub use syscall::{Args, SyscallOutcome};
pub use task::EnvSnapshot;
pub use trap::{FaultOutcome, TrapFrame};
