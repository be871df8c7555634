// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine -> output loop -> NIC loopback -> input loop -> engine.

use std::cell::RefCell;
use std::rc::Rc;

use axon::KernelConfig;
use axon_abi::layout::{PAGE_SIZE, UTEXT};
use axon_abi::packet::{NetRequest, PacketHeader, PACKET_HEADER_LEN};
use axon_abi::{EnvId, Perm};
use axon_e2e::{Machine, Wire};
use axon_rt::{ipc_send, Program, Receiver, Step, Sys};
use net_e1000::NicConfig;
use netiod::{InputLoop, NetIoConfig, OutputLoop};

const OUT_PAGE: usize = UTEXT;
const IN_PAGE: usize = UTEXT + PAGE_SIZE;

#[derive(Debug)]
enum Phase {
    Send,
    Await,
}

/// Stand-in protocol engine: sends one frame, waits for it to come back.
struct Engine {
    output: Rc<RefCell<Option<EnvId>>>,
    input: Rc<RefCell<Option<EnvId>>>,
    pending: Vec<Vec<u8>>,
    echoed: Rc<RefCell<Vec<Vec<u8>>>>,
    rx: Receiver,
    phase: Phase,
}

impl Engine {
    fn send(&mut self, sys: &mut Sys<'_>) -> Step {
        let (Some(output), Some(frame)) = (*self.output.borrow(), self.pending.first().cloned()) else {
            return Step::Exit;
        };
        sys.page_alloc(EnvId::CURRENT, OUT_PAGE, Perm::RW).unwrap();
        sys.write(OUT_PAGE, &PacketHeader::new(frame.len() as u32).to_le_bytes()).unwrap();
        sys.write(OUT_PAGE + PACKET_HEADER_LEN, &frame).unwrap();
        match ipc_send(sys, output, NetRequest::Output as u32, Some(OUT_PAGE), Perm::REQUIRED) {
            Ok(()) => {
                self.pending.remove(0);
                self.phase = Phase::Await;
                Step::Ran
            }
            Err(err) if err.is_transient() => Step::Yield,
            Err(err) => panic!("engine send: {err}"),
        }
    }

    fn collect(&mut self, sys: &mut Sys<'_>) -> Step {
        let Some(msg) = self.rx.poll(sys).unwrap() else {
            return Step::Blocked;
        };
        if Some(msg.from) != *self.input.borrow() || msg.value != NetRequest::Input as u32 {
            return Step::Ran;
        }
        let mut raw = [0u8; PACKET_HEADER_LEN];
        sys.read(IN_PAGE, &mut raw).unwrap();
        let len = PacketHeader::from_le_bytes(raw).frame_len().unwrap();
        let mut frame = vec![0u8; len];
        sys.read(IN_PAGE + PACKET_HEADER_LEN, &mut frame).unwrap();
        self.echoed.borrow_mut().push(frame);
        self.phase = Phase::Send;
        Step::Ran
    }
}

impl Program for Engine {
    fn step(&mut self, sys: &mut Sys<'_>) -> Step {
        match self.phase {
            Phase::Send => self.send(sys),
            Phase::Await => self.collect(sys),
        }
    }

    fn name(&self) -> &str {
        "engine"
    }
}

fn frames(count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|i| (0..60 + i * 37).map(|b| (b + i) as u8).collect()).collect()
}

#[test]
fn frames_round_trip_through_both_loops() {
    let nic = NicConfig { tx_descriptors: 8, rx_descriptors: 8, ..NicConfig::default() };
    let mut m = Machine::boot(KernelConfig::default().with_frames(512).with_nic(nic)).with_wire(Wire::Loopback);

    let sent = frames(20);
    let output = Rc::new(RefCell::new(None));
    let input = Rc::new(RefCell::new(None));
    let echoed = Rc::new(RefCell::new(Vec::new()));
    let engine = m.spawn(Engine {
        output: output.clone(),
        input: input.clone(),
        pending: sent.clone(),
        echoed: echoed.clone(),
        rx: Receiver::new(Some(IN_PAGE)),
        phase: Phase::Send,
    });
    let config = NetIoConfig::new(engine);
    *output.borrow_mut() = Some(m.spawn(OutputLoop::new(config)));
    *input.borrow_mut() = Some(m.spawn(InputLoop::new(config)));

    assert!(m.run_until(20_000, |_| echoed.borrow().len() == sent.len()));
    assert_eq!(*echoed.borrow(), sent);
    assert_eq!(m.kernel().check_invariants(), Ok(()));
    let stats = m.kernel().nic().unwrap().stats();
    assert_eq!(stats.tx_queued, 20);
    assert_eq!(stats.rx_delivered, 20);
}

#[test]
fn output_loop_drains_to_the_wire() {
    let nic = NicConfig { tx_descriptors: 8, rx_descriptors: 8, ..NicConfig::default() };
    let mut m = Machine::boot(KernelConfig::default().with_frames(256).with_nic(nic)).with_wire(Wire::Drain);
    let engine = m.kernel_mut().create_env().unwrap();
    let output = m.spawn(OutputLoop::new(NetIoConfig::new(engine)));

    for frame in frames(3) {
        assert!(m.run_until(100, |m| m.kernel().env(output).is_some_and(|e| e.ipc.recving)));
        let mut sys = m.sys(engine);
        sys.page_alloc(EnvId::CURRENT, OUT_PAGE, Perm::RW).unwrap();
        sys.write(OUT_PAGE, &PacketHeader::new(frame.len() as u32).to_le_bytes()).unwrap();
        sys.write(OUT_PAGE + PACKET_HEADER_LEN, &frame).unwrap();
        ipc_send(&mut sys, output, NetRequest::Output as u32, Some(OUT_PAGE), Perm::REQUIRED).unwrap();
    }
    assert!(m.run_until(100, |m| m.transmitted().len() == 3));
    assert_eq!(m.transmitted(), frames(3).as_slice());
}
