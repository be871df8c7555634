// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rendezvous helpers on top of `recv` / `try_send`.

use axon_abi::{EnvId, Perm};

use crate::error::Result;
use crate::sys::Sys;

/// A delivered message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpcMessage {
    pub from: EnvId,
    pub value: u32,
    /// Permission of the mapping installed at the receive address, empty if
    /// no page was transferred.
    pub perm: Perm,
}

/// Receive in two steps: arm, then collect after being woken.
#[derive(Debug)]
pub struct Receiver {
    dst: Option<usize>,
    armed: bool,
}

impl Receiver {
    /// `dst` is where a transferred page should be mapped; `None` refuses pages.
    pub fn new(dst: Option<usize>) -> Self {
        Self { dst, armed: false }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arms `recv` if idle; otherwise returns the message once delivered.
    ///
    /// `None` means the caller should suspend with `Step::Blocked`.
    pub fn poll(&mut self, sys: &mut Sys<'_>) -> Result<Option<IpcMessage>> {
        if !self.armed {
            sys.ipc_recv(self.dst)?;
            self.armed = true;
            return Ok(None);
        }
        let env = sys.thisenv()?;
        if env.ipc.recving {
            return Ok(None);
        }
        self.armed = false;
        Ok(Some(IpcMessage { from: env.ipc.from, value: env.ipc.value, perm: env.ipc.perm }))
    }
}

/// Single send attempt. `NotReceiving` is returned to the caller, which
/// yields and tries again on its next step.
pub fn ipc_send(sys: &mut Sys<'_>, to: EnvId, value: u32, page: Option<usize>, perm: Perm) -> Result<()> {
    let perm = if page.is_some() { perm } else { Perm::empty() };
    sys.ipc_try_send(to, value, page, perm)
}
