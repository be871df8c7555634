// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! NIC syscalls: copy frames between user memory and the descriptor rings.

use axon_abi::packet::MAX_FRAME_LEN;
use axon_abi::{EnvId, SysError};
use axon_hal::RegisterFile;
use net_e1000::{E1000, NicError, RX_BUFFER_SIZE};

use crate::error::KResult;
use crate::kernel::Kernel;
use crate::mm::{AddressSpaceView, AddressSpaceViewMut};

/// The NIC model attached at boot.
pub type Nic = E1000<RegisterFile>;

fn nic_err(err: NicError) -> SysError {
    match err {
        NicError::QueueFull => SysError::QueueFull,
        NicError::QueueEmpty => SysError::QueueEmpty,
        NicError::LinkDown => SysError::NoDevice,
        NicError::BadRingSize | NicError::FrameTooLarge { .. } | NicError::BufferTooSmall { .. } => {
            SysError::InvalidArgument
        }
    }
}

impl Kernel {
    pub fn nic(&self) -> Option<&Nic> {
        self.nic.as_ref()
    }

    /// Driver handle for the device side (hardware ticks in a harness).
    pub fn nic_mut(&mut self) -> Option<&mut Nic> {
        self.nic.as_mut()
    }

    /// Queues `len` bytes at `va` for transmission.
    pub fn net_try_transmit(&mut self, caller: EnvId, va: usize, len: usize) -> KResult<()> {
        if len > MAX_FRAME_LEN {
            return Err(SysError::InvalidArgument.into());
        }
        let env = self.envs.get(caller).ok_or(SysError::BadTarget)?;
        let nic = self.nic.as_mut().ok_or(SysError::NoDevice)?;
        let mut frame = [0u8; MAX_FRAME_LEN];
        AddressSpaceView::new(&env.space, &self.frames)
            .read(va, &mut frame[..len])
            .map_err(|_| SysError::InvalidArgument)?;
        nic.try_transmit(&frame[..len]).map_err(nic_err)?;
        Ok(())
    }

    /// Copies the next received frame to `va` and its length to `len_va`.
    ///
    /// The length is stored even when `capacity` is too small; the frame then
    /// stays in the ring and the call fails with `InvalidArgument`.
    pub fn net_try_receive(&mut self, caller: EnvId, va: usize, capacity: usize, len_va: usize) -> KResult<()> {
        let env = self.envs.get(caller).ok_or(SysError::BadTarget)?;
        let nic = self.nic.as_mut().ok_or(SysError::NoDevice)?;
        let mut user = AddressSpaceViewMut::new(&env.space, &mut self.frames);
        // Check both buffers first so a consumed frame always lands somewhere.
        let view = user.as_view();
        view.check(len_va, 4, true).map_err(|_| SysError::InvalidArgument)?;
        view.check(va, capacity, true).map_err(|_| SysError::InvalidArgument)?;

        let mut frame = [0u8; RX_BUFFER_SIZE];
        let window = capacity.min(RX_BUFFER_SIZE);
        let (result, len) = match nic.try_receive(&mut frame[..window]) {
            Ok(len) => (Ok(()), len),
            Err(NicError::BufferTooSmall { len }) => (Err(SysError::InvalidArgument), len),
            Err(err) => return Err(nic_err(err).into()),
        };
        let stored = user.write(len_va, &(len as u32).to_le_bytes());
        if result.is_ok() {
            user.write(va, &frame[..len]).map_err(|_| SysError::InvalidArgument)?;
        }
        stored.map_err(|_| SysError::InvalidArgument)?;
        result.map_err(Into::into)
    }
}
