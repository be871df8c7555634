// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output loop: engine -> transmit ring.
//!
//! Waits in `recv` for a packet page from the engine, validates it and
//! hands the frame to `try_transmit`, yielding while the ring is full.

use axon_abi::packet::{NetRequest, PacketHeader, PACKET_HEADER_LEN};
use axon_abi::{Perm, SysError};
use axon_rt::{IpcMessage, Program, Receiver, RtError, Step, Sys};

use crate::config::{Backoff, LoopStats, NetIoConfig};
use crate::error::{NetIoError, Rejected};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Receiving,
    Transmitting { len: usize },
    Stopped,
}

/// Forwards frames from the protocol engine to the NIC.
pub struct OutputLoop {
    config: NetIoConfig,
    rx: Receiver,
    state: State,
    backoff: Backoff,
    stats: LoopStats,
}

impl OutputLoop {
    pub fn new(config: NetIoConfig) -> Self {
        Self {
            rx: Receiver::new(Some(config.packet_va)),
            config,
            state: State::Receiving,
            backoff: Backoff::default(),
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    fn validate(&self, sys: &mut Sys<'_>, msg: &IpcMessage) -> Result<Result<usize, Rejected>, RtError> {
        if msg.from != self.config.engine {
            return Ok(Err(Rejected::Sender(msg.from)));
        }
        if NetRequest::from_raw(msg.value) != Some(NetRequest::Output) {
            return Ok(Err(Rejected::Request(msg.value)));
        }
        if !msg.perm.contains(Perm::PRESENT) {
            return Ok(Err(Rejected::NoPage));
        }
        let mut raw = [0u8; PACKET_HEADER_LEN];
        sys.read(self.config.packet_va, &mut raw)?;
        let header = PacketHeader::from_le_bytes(raw);
        Ok(header.frame_len().ok_or(Rejected::Length(header.len)))
    }

    fn advance(&mut self, sys: &mut Sys<'_>) -> Result<Step, NetIoError> {
        match self.state {
            State::Receiving => {
                let Some(msg) = self.rx.poll(sys)? else {
                    return Ok(Step::Blocked);
                };
                match self.validate(sys, &msg)? {
                    Ok(len) => self.state = State::Transmitting { len },
                    Err(why) => {
                        log::warn!("netiod/output: dropped request: {why}");
                        self.stats.rejected += 1;
                    }
                }
                Ok(Step::Ran)
            }
            State::Transmitting { len } => {
                match sys.net_try_transmit(self.config.packet_va + PACKET_HEADER_LEN, len) {
                    Ok(()) => {
                        self.backoff.reset();
                        self.stats.packets += 1;
                        self.state = State::Receiving;
                        log::debug!("netiod/output: sent {len} bytes");
                        Ok(Step::Ran)
                    }
                    Err(RtError::Sys(SysError::QueueFull)) => {
                        if self.backoff.retry(self.config.retry_budget, &mut self.stats) {
                            Ok(Step::Yield)
                        } else {
                            Err(NetIoError::RetriesExhausted(self.backoff.streak()))
                        }
                    }
                    Err(err) => Err(err.into()),
                }
            }
            State::Stopped => Ok(Step::Exit),
        }
    }
}

impl Program for OutputLoop {
    fn step(&mut self, sys: &mut Sys<'_>) -> Step {
        match self.advance(sys) {
            Ok(step) => step,
            Err(err) => {
                log::error!("netiod/output: stopping: {err}");
                self.state = State::Stopped;
                Step::Exit
            }
        }
    }

    fn name(&self) -> &str {
        "netiod-output"
    }
}
