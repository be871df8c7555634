// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input loop: receive ring -> engine.
//!
//! The packet page is allocated fresh for every frame and unmapped right
//! after it is sent, so the engine keeps the only mapping of a frame it
//! was handed.

use axon_abi::packet::{NetRequest, PacketHeader, MAX_FRAME_LEN, PACKET_HEADER_LEN};
use axon_abi::{EnvId, Perm, SysError};
use axon_rt::{ipc_send, Program, RtError, Step, Sys};

use crate::config::{Backoff, LoopStats, NetIoConfig};
use crate::error::NetIoError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Start,
    Allocating,
    Receiving,
    Sending,
    Stopped,
}

/// Forwards frames from the NIC to the protocol engine.
pub struct InputLoop {
    config: NetIoConfig,
    state: State,
    backoff: Backoff,
    stats: LoopStats,
}

impl InputLoop {
    pub fn new(config: NetIoConfig) -> Self {
        Self { config, state: State::Start, backoff: Backoff::default(), stats: LoopStats::default() }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    fn transient(&mut self, err: RtError) -> Result<Step, NetIoError> {
        if !err.is_transient() {
            return Err(err.into());
        }
        if self.backoff.retry(self.config.retry_budget, &mut self.stats) {
            Ok(Step::Yield)
        } else {
            Err(NetIoError::RetriesExhausted(self.backoff.streak()))
        }
    }

    fn advance(&mut self, sys: &mut Sys<'_>) -> Result<Step, NetIoError> {
        let page = self.config.packet_va;
        match self.state {
            State::Start => {
                sys.page_unmap(EnvId::CURRENT, page)?;
                // Kernel stores skip the fault handler; resolve copy-on-write on the slot now.
                sys.write(self.config.len_va, &0u32.to_le_bytes())?;
                self.state = State::Allocating;
                Ok(Step::Ran)
            }
            State::Allocating => {
                sys.page_alloc(EnvId::CURRENT, page, Perm::RW)?;
                self.state = State::Receiving;
                Ok(Step::Ran)
            }
            State::Receiving => {
                let data = page + PACKET_HEADER_LEN;
                match sys.net_try_receive(data, MAX_FRAME_LEN, self.config.len_va) {
                    Ok(()) => {
                        self.backoff.reset();
                        let mut raw = [0u8; 4];
                        sys.read(self.config.len_va, &mut raw)?;
                        let header = PacketHeader::new(u32::from_le_bytes(raw));
                        sys.write(page, &header.to_le_bytes())?;
                        self.state = State::Sending;
                        Ok(Step::Ran)
                    }
                    Err(err @ RtError::Sys(SysError::QueueEmpty)) => self.transient(err),
                    Err(err) => Err(err.into()),
                }
            }
            State::Sending => match ipc_send(sys, self.config.engine, NetRequest::Input as u32, Some(page), Perm::RW) {
                Ok(()) => {
                    self.backoff.reset();
                    sys.page_unmap(EnvId::CURRENT, page)?;
                    self.stats.packets += 1;
                    self.state = State::Allocating;
                    log::debug!("netiod/input: delivered frame {}", self.stats.packets);
                    Ok(Step::Ran)
                }
                Err(err) => self.transient(err),
            },
            State::Stopped => Ok(Step::Exit),
        }
    }
}

impl Program for InputLoop {
    fn step(&mut self, sys: &mut Sys<'_>) -> Step {
        match self.advance(sys) {
            Ok(step) => step,
            Err(err) => {
                log::error!("netiod/input: stopping: {err}");
                self.state = State::Stopped;
                Step::Exit
            }
        }
    }

    fn name(&self) -> &str {
        "netiod-input"
    }
}
