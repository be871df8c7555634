// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use axon_abi::layout::{PAGE_SIZE, UTEXT};
use axon_abi::{EnvId, EnvStatus, Perm, SysError};

use crate::config::KernelConfig;
use crate::error::Error;
use crate::kernel::Kernel;
use crate::types::{PageArg, UserPage};

fn setup() -> (Kernel, EnvId, EnvId) {
    let mut k = Kernel::boot(KernelConfig::default().with_frames(64).without_nic()).unwrap();
    let a = k.create_env().unwrap();
    let b = k.create_env().unwrap();
    (k, a, b)
}

fn page(va: usize) -> UserPage {
    UserPage::new(va).unwrap()
}

#[test]
fn send_to_idle_env_is_not_receiving() {
    let (mut k, a, b) = setup();
    let before = k.env(b).unwrap();
    assert_eq!(
        k.ipc_try_send(a, b, 7, PageArg::None, Perm::empty()),
        Err(Error::Sys(SysError::NotReceiving))
    );
    assert_eq!(k.env(b).unwrap(), before);
}

#[test]
fn recv_blocks_until_value_arrives() {
    let (mut k, a, b) = setup();
    k.ipc_recv(b, PageArg::None).unwrap();
    let waiting = k.env(b).unwrap();
    assert_eq!(waiting.status, EnvStatus::NotRunnable);
    assert!(waiting.ipc.recving);

    k.ipc_try_send(a, b, 42, PageArg::None, Perm::empty()).unwrap();
    let got = k.env(b).unwrap();
    assert_eq!(got.status, EnvStatus::Runnable);
    assert!(!got.ipc.recving);
    assert_eq!(got.ipc.value, 42);
    assert_eq!(got.ipc.from, a);
    assert_eq!(got.ipc.perm, Perm::empty());
    assert_eq!(got.frame.return_value(), 0);
}

#[test]
fn only_one_sender_is_served() {
    let (mut k, a, b) = setup();
    let c = k.create_env().unwrap();
    k.ipc_recv(b, PageArg::None).unwrap();
    assert_eq!(k.ipc_try_send(a, b, 1, PageArg::None, Perm::empty()), Ok(()));
    assert_eq!(
        k.ipc_try_send(c, b, 2, PageArg::None, Perm::empty()),
        Err(Error::Sys(SysError::NotReceiving))
    );
    let got = k.env(b).unwrap();
    assert_eq!((got.ipc.from, got.ipc.value), (a, 1));
}

#[test]
fn page_is_mapped_at_receiver_destination() {
    let (mut k, a, b) = setup();
    k.page_alloc(a, EnvId::CURRENT, page(UTEXT), Perm::RW).unwrap();
    k.view_mut(a).unwrap().write(UTEXT, b"ping").unwrap();
    let dst = UTEXT + 4 * PAGE_SIZE;
    k.ipc_recv(b, PageArg::Page(page(dst))).unwrap();

    k.ipc_try_send(a, b, 5, PageArg::Page(page(UTEXT)), Perm::RW).unwrap();
    let got = k.env(b).unwrap();
    assert_eq!(got.ipc.perm, Perm::RW);
    let mut buf = [0u8; 4];
    k.view(b).unwrap().read(dst, &mut buf).unwrap();
    assert_eq!(&buf, b"ping");
    let frame = k.view(a).unwrap().query(UTEXT).unwrap().frame;
    assert_eq!(k.frames().refcount(frame), Some(2));
    assert_eq!(k.check_invariants(), Ok(()));
}

#[test]
fn page_is_dropped_when_receiver_wants_none() {
    let (mut k, a, b) = setup();
    k.page_alloc(a, EnvId::CURRENT, page(UTEXT), Perm::RW).unwrap();
    let before = k.view(b).unwrap().mappings();
    k.ipc_recv(b, PageArg::None).unwrap();
    k.ipc_try_send(a, b, 9, PageArg::Page(page(UTEXT)), Perm::RW).unwrap();
    let got = k.env(b).unwrap();
    assert_eq!(got.ipc.value, 9);
    assert_eq!(got.ipc.perm, Perm::empty());
    assert_eq!(k.view(b).unwrap().mappings(), before);
}

#[test]
fn rejected_page_leaves_receiver_waiting() {
    let (mut k, a, b) = setup();
    k.page_alloc(a, EnvId::CURRENT, page(UTEXT), Perm::REQUIRED).unwrap();
    k.ipc_recv(b, PageArg::Page(page(UTEXT))).unwrap();
    let inval = Err(Error::Sys(SysError::InvalidArgument));

    // unmapped source
    assert_eq!(k.ipc_try_send(a, b, 1, PageArg::Page(page(UTEXT + PAGE_SIZE)), Perm::REQUIRED), inval);
    // write escalation
    assert_eq!(k.ipc_try_send(a, b, 1, PageArg::Page(page(UTEXT)), Perm::RW), inval);
    // copy-on-write of a read-only page
    assert_eq!(k.ipc_try_send(a, b, 1, PageArg::Page(page(UTEXT)), Perm::REQUIRED | Perm::COW), inval);
    // malformed permission word
    assert_eq!(k.ipc_try_send(a, b, 1, PageArg::Page(page(UTEXT)), Perm::PRESENT), inval);

    let waiting = k.env(b).unwrap();
    assert!(waiting.ipc.recving);
    assert_eq!(waiting.status, EnvStatus::NotRunnable);
    assert!(k.view(b).unwrap().query(UTEXT).is_none());
}

#[test]
fn received_read_only_page_stays_read_only() {
    let (mut k, a, b) = setup();
    k.page_alloc(a, EnvId::CURRENT, page(UTEXT), Perm::REQUIRED).unwrap();
    k.ipc_recv(b, PageArg::Page(page(UTEXT))).unwrap();
    k.ipc_try_send(a, b, 1, PageArg::Page(page(UTEXT)), Perm::REQUIRED).unwrap();

    // The receiver cannot upgrade its copy by mapping it onward.
    let me = EnvId::CURRENT;
    let dst = page(UTEXT + PAGE_SIZE);
    let inval = Err(Error::Sys(SysError::InvalidArgument));
    assert_eq!(k.page_map(b, me, page(UTEXT), me, dst, Perm::REQUIRED | Perm::COW), inval);
    assert_eq!(k.page_map(b, me, page(UTEXT), me, dst, Perm::RW), inval);
    assert_eq!(k.page_share_cow(b, me, page(UTEXT), me, dst), inval);
    assert_eq!(k.view(b).unwrap().query(UTEXT).unwrap().perm, Perm::REQUIRED);
}

#[test]
fn send_needs_no_authority() {
    let (mut k, a, b) = setup();
    let child = k.exofork(b).unwrap();
    k.ipc_recv(child, PageArg::None).unwrap();
    assert_eq!(k.ipc_try_send(a, child, 3, PageArg::None, Perm::empty()), Ok(()));
}

#[test]
fn send_to_dead_env_is_bad_target() {
    let (mut k, a, b) = setup();
    k.destroy_env(b);
    assert_eq!(
        k.ipc_try_send(a, b, 3, PageArg::None, Perm::empty()),
        Err(Error::Sys(SysError::BadTarget))
    );
}
