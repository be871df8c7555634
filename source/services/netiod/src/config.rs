// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use axon_abi::layout::{PAGE_SIZE, USTACKTOP};
use axon_abi::EnvId;

/// Where both loops keep their packet page.
pub const PACKET_VA: usize = 0x0fff_f000;
/// Out-length slot for the driver, at the top of the input loop's stack.
pub const LEN_SLOT_VA: usize = USTACKTOP - 4;

/// Settings shared by the input and output loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetIoConfig {
    /// The protocol engine: the only peer the loops talk to.
    pub engine: EnvId,
    /// Page-aligned address of the packet page.
    pub packet_va: usize,
    /// Four writable bytes for the received length.
    pub len_va: usize,
    /// Consecutive `QueueFull` / `QueueEmpty` / `NotReceiving` results
    /// tolerated before the loop gives up. `None` retries forever.
    pub retry_budget: Option<u32>,
}

impl NetIoConfig {
    pub fn new(engine: EnvId) -> Self {
        Self { engine, packet_va: PACKET_VA, len_va: LEN_SLOT_VA, retry_budget: None }
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    pub fn with_packet_va(mut self, va: usize) -> Self {
        debug_assert_eq!(va % PAGE_SIZE, 0);
        self.packet_va = va;
        self
    }
}

/// Counters kept by each loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames moved between the ring and the engine.
    pub packets: u64,
    /// Yields caused by a full/empty ring or an engine not in `recv`.
    pub retries: u64,
    /// Output requests dropped as malformed.
    pub rejected: u64,
}

/// Tracks consecutive transient failures against the budget.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Backoff {
    streak: u32,
}

impl Backoff {
    /// Records one more retry; false once the budget is spent.
    pub(crate) fn retry(&mut self, budget: Option<u32>, stats: &mut LoopStats) -> bool {
        stats.retries += 1;
        self.streak = self.streak.saturating_add(1);
        budget.map_or(true, |max| self.streak <= max)
    }

    pub(crate) fn streak(&self) -> u32 {
        self.streak
    }

    pub(crate) fn reset(&mut self) {
        self.streak = 0;
    }
}
