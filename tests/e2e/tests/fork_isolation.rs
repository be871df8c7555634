// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use axon::KernelConfig;
use axon_abi::layout::{PAGE_SIZE, UTEXT};
use axon_abi::{EnvId, Perm};
use axon_e2e::Machine;
use axon_rt::fork;

const PAGE: usize = UTEXT + 4 * PAGE_SIZE;

fn machine() -> Machine {
    Machine::boot(KernelConfig::default().with_frames(256).without_nic())
}

fn contents(m: &mut Machine, env: EnvId) -> Vec<u8> {
    let mut buf = vec![0u8; PAGE_SIZE];
    m.sys(env).read(PAGE, &mut buf).unwrap();
    buf
}

#[test]
fn parent_and_child_see_their_own_writes() {
    let mut m = machine();
    let a = m.kernel_mut().create_env().unwrap();
    {
        let mut sys = m.sys(a);
        sys.page_alloc(EnvId::CURRENT, PAGE, Perm::RW).unwrap();
        sys.write(PAGE, &[0xaa; PAGE_SIZE]).unwrap();
    }
    let b = fork(&mut m.sys(a)).unwrap();
    m.sys(b).write(PAGE, &[0xbb; PAGE_SIZE]).unwrap();

    assert!(contents(&mut m, a).iter().all(|&x| x == 0xaa));
    assert!(contents(&mut m, b).iter().all(|&x| x == 0xbb));
    assert_eq!(m.kernel().check_invariants(), Ok(()));
}

#[test]
fn read_only_page_is_shared_after_fork() {
    let mut m = machine();
    let a = m.kernel_mut().create_env().unwrap();
    {
        let mut sys = m.sys(a);
        sys.page_alloc(EnvId::CURRENT, PAGE, Perm::RW).unwrap();
        sys.write(PAGE, b"constant").unwrap();
        // Drop write access by remapping the page onto itself.
        sys.page_map(EnvId::CURRENT, PAGE, EnvId::CURRENT, PAGE, Perm::REQUIRED).unwrap();
    }
    let b = fork(&mut m.sys(a)).unwrap();

    let k = m.kernel();
    let pa = k.view(a).unwrap().query(PAGE).unwrap();
    let pb = k.view(b).unwrap().query(PAGE).unwrap();
    assert_eq!(pa.frame, pb.frame);
    assert_eq!(pb.perm, Perm::REQUIRED);
    assert_eq!(k.frames().refcount(pa.frame), Some(2));
    assert_eq!(&contents(&mut m, b)[..8], b"constant");
}

#[test]
fn destroying_either_side_keeps_the_other_intact() {
    let mut m = machine();
    let a = m.kernel_mut().create_env().unwrap();
    {
        let mut sys = m.sys(a);
        sys.page_alloc(EnvId::CURRENT, PAGE, Perm::RW).unwrap();
        sys.write(PAGE, &[0x5a; PAGE_SIZE]).unwrap();
    }
    let b = fork(&mut m.sys(a)).unwrap();
    m.kernel_mut().env_destroy(a, b).unwrap();
    assert_eq!(m.kernel().check_invariants(), Ok(()));

    // Parent's mapping is still copy-on-write; its next write copies privately.
    m.sys(a).write(PAGE, &[0x11]).unwrap();
    assert_eq!(contents(&mut m, a)[0], 0x11);
    assert_eq!(contents(&mut m, a)[1], 0x5a);
    assert_eq!(m.kernel().check_invariants(), Ok(()));
}
