// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-processor machine for end-to-end scenarios.
//!
//! Each tick lets the NIC model make progress, asks the kernel scheduler for
//! the next runnable process and runs one step of its program.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use axon::{Kernel, KernelConfig};
use axon_abi::EnvId;
use axon_rt::{Program, Step, Sys};
use net_e1000::RxDrop;

/// What the far end of the cable does each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wire {
    /// Device does nothing on its own.
    Idle,
    /// Transmitted frames are collected in [`Machine::transmitted`].
    Drain,
    /// Transmitted frames come back on the receive ring.
    Loopback,
}

/// Frames the device moves per tick.
const WIRE_BUDGET: usize = 4;

pub struct Machine {
    kernel: Kernel,
    programs: BTreeMap<EnvId, Box<dyn Program>>,
    wire: Wire,
    transmitted: Vec<Vec<u8>>,
    ticks: u64,
}

impl Machine {
    pub fn boot(config: KernelConfig) -> Self {
        let kernel = match Kernel::boot(config) {
            Ok(kernel) => kernel,
            Err(err) => panic!("boot failed: {err}"),
        };
        Self { kernel, programs: BTreeMap::new(), wire: Wire::Idle, transmitted: Vec::new(), ticks: 0 }
    }

    pub fn with_wire(mut self, wire: Wire) -> Self {
        self.wire = wire;
        self
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    /// Runtime handle for acting as `env` outside of a program step.
    pub fn sys(&mut self, env: EnvId) -> Sys<'_> {
        Sys::new(&mut self.kernel, env)
    }

    /// Creates a root process running `program`.
    pub fn spawn(&mut self, program: impl Program + 'static) -> EnvId {
        let env = match self.kernel.create_env() {
            Ok(env) => env,
            Err(err) => panic!("create_env failed: {err}"),
        };
        self.attach(env, program);
        env
    }

    /// Runs `program` as the body of an existing process, e.g. a fork child.
    pub fn attach(&mut self, env: EnvId, program: impl Program + 'static) {
        self.programs.insert(env, Box::new(program));
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn transmitted(&self) -> &[Vec<u8>] {
        &self.transmitted
    }

    /// Puts `frame` on the receive ring as if it came off the cable.
    pub fn inject(&mut self, frame: &[u8]) -> Result<(), RxDrop> {
        match self.kernel.nic_mut() {
            Some(nic) => nic.device().deliver_rx(frame),
            None => Err(RxDrop::Disabled),
        }
    }

    fn tick_wire(&mut self) {
        let Some(nic) = self.kernel.nic_mut() else {
            return;
        };
        match self.wire {
            Wire::Idle => {}
            Wire::Drain => self.transmitted.extend(nic.device().complete_tx(WIRE_BUDGET)),
            Wire::Loopback => {
                nic.device().loopback(WIRE_BUDGET);
            }
        }
    }

    /// One scheduling decision. Returns the process that ran and its step,
    /// or `None` when nothing is runnable.
    pub fn tick(&mut self) -> Option<(EnvId, Step)> {
        self.ticks += 1;
        self.tick_wire();
        let env = self.kernel.schedule_next()?;
        let Some(program) = self.programs.get_mut(&env) else {
            // Runnable but without a body: behaves like a process spinning in yield.
            return Some((env, Step::Yield));
        };
        let mut sys = Sys::new(&mut self.kernel, env);
        let step = program.step(&mut sys);
        match step {
            Step::Ran | Step::Blocked => {}
            Step::Yield => {
                if let Err(err) = sys.yield_now() {
                    log::debug!("{} yield: {err}", program.name());
                }
            }
            Step::Exit => {
                sys.exit();
                self.programs.remove(&env);
            }
        }
        if self.kernel.env(env).is_none() {
            self.programs.remove(&env);
        }
        Some((env, step))
    }

    /// Ticks until `done` holds or `max_ticks` pass; true if `done` held.
    pub fn run_until(&mut self, max_ticks: u64, mut done: impl FnMut(&Machine) -> bool) -> bool {
        for _ in 0..max_ticks {
            if done(self) {
                return true;
            }
            self.tick();
        }
        done(self)
    }
}
