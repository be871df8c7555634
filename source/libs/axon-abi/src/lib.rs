// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! CONTEXT: Kernel/user ABI shared by the axon kernel, the user runtime and services
//! OWNERS: @kernel-team
//! STATUS: Functional
//! API_STABILITY: Stable (syscall numbers, errno values, trap frame layout)
//! TEST_COVERAGE: Unit tests per module
//!
//! PUBLIC API:
//! - `EnvId`, `EnvStatus`: process handles and states
//! - `Perm`, `FaultCode`: page permission vocabulary and fault error codes
//! - `SysError`: error taxonomy with stable errno encoding
//! - `layout`: user virtual memory layout constants
//! - `syscall`: syscall numbers
//! - `UTrapFrame`: frame pushed on the user exception stack
//! - `packet`: page contract between the packet loops and the protocol engine
//!
//! INVARIANTS: Values in this crate are ABI; changing them breaks user binaries.

pub mod env;
pub mod error;
pub mod layout;
pub mod packet;
pub mod perm;
pub mod syscall;
pub mod trapframe;

pub use env::{EnvId, EnvStatus};
pub use error::SysError;
pub use perm::{FaultCode, Perm};
pub use trapframe::UTrapFrame;
