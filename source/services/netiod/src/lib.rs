// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: netiod: packet hand-off between the NIC rings and the protocol engine
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: tests/loops.rs
//!
//! PUBLIC API:
//! - `OutputLoop`: `recv` a packet page from the engine, `try_transmit` it
//! - `InputLoop`: `try_receive` into a fresh page, send it to the engine
//! - `NetIoConfig`, `LoopStats`, `NetIoError`
//!
//! Both loops are `Program`s. Their suspension points are the `recv` in the
//! output loop and the yields on `QueueFull`, `QueueEmpty` and `NotReceiving`.
//! There is no deadline on any of them unless `retry_budget` is set.

#![forbid(unsafe_code)]

mod config;
mod error;
mod input;
mod output;

pub use config::{LoopStats, NetIoConfig, LEN_SLOT_VA, PACKET_VA};
pub use error::{NetIoError, Rejected};
pub use input::InputLoop;
pub use output::OutputLoop;
