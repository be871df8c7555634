// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! CONTEXT: User runtime for axon processes
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: tests/fork.rs, tests/ipc.rs
//!
//! PUBLIC API:
//! - `Sys`: syscalls and memory access for one process
//! - `fork`, `pgfault`, `set_pgfault_handler`: copy-on-write duplication
//! - `Receiver`, `ipc_send`: rendezvous IPC
//! - `Program`, `Step`: cooperative process bodies
//!
//! DEPENDS_ON: axon (register ABI), axon-abi

extern crate alloc;

pub mod error;
pub mod fork;
pub mod ipc;
pub mod program;
pub mod sys;

pub use error::{Result, RtError};
pub use fork::{fork, pgfault, set_pgfault_handler, PGFAULT_UPCALL};
pub use ipc::{ipc_send, IpcMessage, Receiver};
pub use program::{Program, Step};
pub use sys::Sys;
