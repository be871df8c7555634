// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::cell::Cell;
use std::rc::Rc;

use axon::KernelConfig;
use axon_abi::{EnvId, Perm, SysError};
use axon_e2e::Machine;
use axon_rt::{ipc_send, Program, Receiver, RtError, Step, Sys};

struct Server {
    rx: Receiver,
    got: Rc<Cell<Option<(EnvId, u32)>>>,
}

impl Program for Server {
    fn step(&mut self, sys: &mut Sys<'_>) -> Step {
        match self.rx.poll(sys) {
            Ok(Some(msg)) => {
                self.got.set(Some((msg.from, msg.value)));
                Step::Exit
            }
            Ok(None) => Step::Blocked,
            Err(_) => Step::Exit,
        }
    }
}

struct Client {
    to: Rc<Cell<Option<EnvId>>>,
    value: u32,
    attempts: Rc<Cell<u32>>,
}

impl Program for Client {
    fn step(&mut self, sys: &mut Sys<'_>) -> Step {
        let Some(to) = self.to.get() else {
            return Step::Yield;
        };
        self.attempts.set(self.attempts.get() + 1);
        match ipc_send(sys, to, self.value, None, Perm::empty()) {
            Ok(()) => Step::Exit,
            Err(err) if err.is_transient() => Step::Yield,
            Err(_) => Step::Exit,
        }
    }
}

fn machine() -> Machine {
    Machine::boot(KernelConfig::default().with_frames(128).without_nic())
}

#[test]
fn value_only_rendezvous() {
    let mut m = machine();
    let got = Rc::new(Cell::new(None));
    let to = Rc::new(Cell::new(None));
    let attempts = Rc::new(Cell::new(0));
    // The client runs first and has to retry until the server is waiting.
    let r = m.spawn(Client { to: to.clone(), value: 42, attempts: attempts.clone() });
    let s = m.spawn(Server { rx: Receiver::new(None), got: got.clone() });
    to.set(Some(s));
    let before = m.kernel().view(s).unwrap().mappings();

    assert!(m.run_until(100, |_| got.get().is_some()));
    assert_eq!(got.get(), Some((r, 42)));
    assert!(attempts.get() >= 1);
    assert_eq!(m.kernel().view(s).unwrap().mappings(), before);
}

#[test]
fn second_sender_loses() {
    let mut m = machine();
    let s = m.kernel_mut().create_env().unwrap();
    let a = m.kernel_mut().create_env().unwrap();
    let b = m.kernel_mut().create_env().unwrap();

    let mut rx = Receiver::new(None);
    rx.poll(&mut m.sys(s)).unwrap();
    let first = ipc_send(&mut m.sys(a), s, 1, None, Perm::empty());
    let second = ipc_send(&mut m.sys(b), s, 2, None, Perm::empty());
    assert_eq!(first, Ok(()));
    assert_eq!(second, Err(RtError::Sys(SysError::NotReceiving)));

    let msg = rx.poll(&mut m.sys(s)).unwrap().unwrap();
    assert_eq!((msg.from, msg.value), (a, 1));
}

#[test]
fn idle_target_is_untouched() {
    let mut m = machine();
    let s = m.kernel_mut().create_env().unwrap();
    let a = m.kernel_mut().create_env().unwrap();
    let before = m.kernel().env(s).unwrap();
    for value in 0..4 {
        assert_eq!(
            ipc_send(&mut m.sys(a), s, value, None, Perm::empty()),
            Err(RtError::Sys(SysError::NotReceiving))
        );
    }
    assert_eq!(m.kernel().env(s).unwrap(), before);
}

#[test]
fn blocked_server_is_never_scheduled() {
    let mut m = machine();
    let got = Rc::new(Cell::new(None));
    let s = m.spawn(Server { rx: Receiver::new(None), got: got.clone() });
    assert_eq!(m.tick(), Some((s, Step::Blocked)));
    // Nothing else is runnable.
    for _ in 0..10 {
        assert_eq!(m.tick(), None);
    }
    assert!(got.get().is_none());
}
