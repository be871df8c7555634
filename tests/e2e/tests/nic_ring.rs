// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use axon::KernelConfig;
use axon_abi::layout::{PAGE_SIZE, UTEXT};
use axon_abi::{EnvId, Perm, SysError};
use axon_e2e::Machine;
use axon_rt::RtError;
use net_e1000::desc::Descriptor;
use net_e1000::NicConfig;

const RING: usize = 8;
const BUF: usize = UTEXT;

fn machine() -> (Machine, EnvId) {
    let nic = NicConfig { tx_descriptors: RING, rx_descriptors: RING, ..NicConfig::default() };
    let mut m = Machine::boot(KernelConfig::default().with_frames(128).with_nic(nic));
    let env = m.kernel_mut().create_env().unwrap();
    m.sys(env).page_alloc(EnvId::CURRENT, BUF, Perm::RW).unwrap();
    (m, env)
}

fn tail(m: &Machine) -> u32 {
    use axon_hal::Bus;
    m.kernel().nic().unwrap().bus().read(net_e1000::regs::TDT)
}

#[test]
fn full_ring_rejects_one_more() {
    let (mut m, env) = machine();
    let mut sys = m.sys(env);
    sys.write(BUF, &[0x33; 64]).unwrap();
    for _ in 0..RING {
        assert_eq!(sys.net_try_transmit(BUF, 64), Ok(()));
    }
    assert_eq!(sys.net_try_transmit(BUF, 64), Err(RtError::Sys(SysError::QueueFull)));
}

#[test]
fn oversized_frame_leaves_ring_alone() {
    let (mut m, env) = machine();
    let before_tail = tail(&m);
    let before: Vec<_> = (0..RING).map(|i| m.kernel().nic().unwrap().tx_desc(i)).collect();
    assert_eq!(
        m.sys(env).net_try_transmit(BUF, 1519),
        Err(RtError::Sys(SysError::InvalidArgument))
    );
    let after: Vec<_> = (0..RING).map(|i| m.kernel().nic().unwrap().tx_desc(i)).collect();
    assert_eq!(before, after);
    assert_eq!(tail(&m), before_tail);
}

#[test]
fn wraparound_with_done_polling() {
    let (mut m, env) = machine();
    for i in 0..=RING {
        let slot = i % RING;
        let frame = vec![i as u8; 60 + i];
        let mut sys = m.sys(env);
        sys.write(BUF, &frame).unwrap();
        sys.net_try_transmit(BUF, frame.len()).unwrap();

        let nic = m.kernel_mut().nic_mut().unwrap();
        assert!(!nic.tx_desc(slot).is_done());
        let sent = nic.device().complete_tx(1);
        assert_eq!(sent, vec![frame]);
        assert!(nic.tx_desc(slot).is_done());
    }
    assert_eq!(tail(&m) as usize, 1);
}

#[test]
fn receive_reports_length_through_user_memory() {
    let (mut m, env) = machine();
    let len_va = BUF + PAGE_SIZE - 4;
    assert_eq!(
        m.sys(env).net_try_receive(BUF, 2048, len_va),
        Err(RtError::Sys(SysError::QueueEmpty))
    );
    m.inject(&[7; 300]).unwrap();
    let mut sys = m.sys(env);
    assert_eq!(sys.net_try_receive(BUF, 100, len_va), Err(RtError::Sys(SysError::InvalidArgument)));
    let mut len = [0u8; 4];
    sys.read(len_va, &mut len).unwrap();
    assert_eq!(u32::from_le_bytes(len), 300);
    assert_eq!(sys.net_try_receive(BUF, 2048, len_va), Ok(()));
    let mut body = vec![0u8; 300];
    sys.read(BUF, &mut body).unwrap();
    assert!(body.iter().all(|&b| b == 7));
}
