// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use proptest::prelude::*;

use axon_abi::layout::{PAGE_SIZE, PT_SPAN, UTEXT};
use axon_abi::{EnvId, Perm};

use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::mm::FrameId;
use crate::types::{PageArg, UserPage};

const PAGES: usize = 6;

fn arb_page() -> impl Strategy<Value = UserPage> {
    // Two leaf tables' worth of candidate pages so growth is exercised.
    (0..PAGES).prop_map(|i| {
        let base = if i % 2 == 0 { UTEXT } else { UTEXT + PT_SPAN };
        UserPage::new(base + (i / 2) * PAGE_SIZE).expect("aligned user page")
    })
}

/// Raw permission words, valid or not.
fn arb_raw_perm() -> impl Strategy<Value = Perm> {
    (0u32..0x1000).prop_map(Perm::from_bits_retain)
}

/// Permission words accepted at the syscall boundary.
fn arb_user_perm() -> impl Strategy<Value = Perm> {
    let writable = prop_oneof![Just(Perm::empty()), Just(Perm::WRITABLE), Just(Perm::COW)];
    let avail = (0u32..4).prop_map(|n| Perm::from_bits_retain(n << 9));
    (writable, avail).prop_map(|(w, a)| Perm::REQUIRED | w | a)
}

#[derive(Clone, Debug)]
enum Op {
    Alloc { env: usize, page: UserPage, perm: Perm },
    Map { src: usize, src_page: UserPage, dst: usize, dst_page: UserPage, perm: Perm },
    Unmap { env: usize, page: UserPage },
    ShareCow { src: usize, src_page: UserPage, dst: usize, dst_page: UserPage },
    Destroy { env: usize },
}

fn arb_op(envs: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..envs, arb_page(), arb_user_perm()).prop_map(|(env, page, perm)| Op::Alloc { env, page, perm }),
        (0..envs, arb_page(), 0..envs, arb_page(), arb_raw_perm())
            .prop_map(|(src, src_page, dst, dst_page, perm)| Op::Map { src, src_page, dst, dst_page, perm }),
        (0..envs, arb_page()).prop_map(|(env, page)| Op::Unmap { env, page }),
        (0..envs, arb_page(), 0..envs, arb_page())
            .prop_map(|(src, src_page, dst, dst_page)| Op::ShareCow { src, src_page, dst, dst_page }),
        (1..envs).prop_map(|env| Op::Destroy { env }),
    ]
}

/// Steps that hand an existing frame to another mapping.
#[derive(Clone, Debug)]
enum Share {
    Map { src: usize, src_page: UserPage, dst: usize, dst_page: UserPage, perm: Perm },
    Send { from: usize, to: usize, src_page: UserPage, dst_page: UserPage, perm: Perm },
    Unmap { env: usize, page: UserPage },
}

fn arb_share(envs: usize) -> impl Strategy<Value = Share> {
    prop_oneof![
        3 => (0..envs, arb_page(), 0..envs, arb_page(), arb_user_perm())
            .prop_map(|(src, src_page, dst, dst_page, perm)| Share::Map { src, src_page, dst, dst_page, perm }),
        3 => (0..envs, 0..envs, arb_page(), arb_page(), arb_user_perm())
            .prop_map(|(from, to, src_page, dst_page, perm)| Share::Send { from, to, src_page, dst_page, perm }),
        1 => (0..envs, arb_page()).prop_map(|(env, page)| Share::Unmap { env, page }),
    ]
}

/// Permissions of every user mapping of `frame`, across all processes.
fn grants_of(k: &Kernel, frame: FrameId) -> Vec<Perm> {
    k.envs()
        .iter()
        .flat_map(|env| env.space().mappings())
        .filter(|(_, mapping)| mapping.frame == frame)
        .map(|(_, mapping)| mapping.perm)
        .collect()
}

/// A root process and its children; the root has authority over all of them.
fn family(k: &mut Kernel, children: usize) -> Vec<EnvId> {
    let root = k.create_env().expect("root env");
    let mut ids = vec![root];
    for _ in 0..children {
        ids.push(k.exofork(root).expect("child env"));
    }
    ids
}

proptest! {
    #[test]
    fn map_never_escalates_to_write(src_perm in arb_user_perm(), req in arb_raw_perm()) {
        let mut k = Kernel::boot(KernelConfig::default().with_frames(32).without_nic()).unwrap();
        let env = k.create_env().unwrap();
        let src = UserPage::new(UTEXT).unwrap();
        let dst = UserPage::new(UTEXT + PAGE_SIZE).unwrap();
        k.page_alloc(env, EnvId::CURRENT, src, src_perm).unwrap();

        let result = k.page_map(env, EnvId::CURRENT, src, EnvId::CURRENT, dst, req);
        let mapped = k.view(env).unwrap().query(dst.addr());
        match result {
            Ok(()) => {
                let mapped = mapped.expect("mapping installed");
                prop_assert_eq!(mapped.perm, req);
                if mapped.perm.is_write_eligible() {
                    prop_assert!(src_perm.is_write_eligible());
                }
            }
            Err(_) => prop_assert!(mapped.is_none()),
        }
    }

    #[test]
    fn registry_stays_consistent(ops in prop::collection::vec(arb_op(4), 1..48)) {
        let mut k = Kernel::boot(KernelConfig::default().with_frames(48).without_nic()).unwrap();
        let ids = family(&mut k, 3);
        let root = ids[0];
        for op in ops {
            // Individual operations may fail; the registry must not drift either way.
            let _ = match op {
                Op::Alloc { env, page, perm } => k.page_alloc(root, ids[env], page, perm),
                Op::Map { src, src_page, dst, dst_page, perm } => {
                    k.page_map(root, ids[src], src_page, ids[dst], dst_page, perm)
                }
                Op::Unmap { env, page } => k.page_unmap(root, ids[env], page),
                Op::ShareCow { src, src_page, dst, dst_page } => {
                    k.page_share_cow(root, ids[src], src_page, ids[dst], dst_page)
                }
                Op::Destroy { env } => k.env_destroy(root, ids[env]),
            };
            prop_assert_eq!(k.check_invariants(), Ok(()));
        }
        for id in ids.iter().rev() {
            k.destroy_env(*id);
        }
        prop_assert_eq!(k.frames().free_count(), k.frames().capacity());
    }

    #[test]
    fn read_only_frame_never_becomes_writable(steps in prop::collection::vec(arb_share(3), 1..40)) {
        let mut k = Kernel::boot(KernelConfig::default().with_frames(64).without_nic()).unwrap();
        let ids = family(&mut k, 2);
        let root = ids[0];
        let origin = UserPage::new(UTEXT).unwrap();
        k.page_alloc(root, EnvId::CURRENT, origin, Perm::REQUIRED).unwrap();
        let frame = k.view(root).unwrap().query(UTEXT).unwrap().frame;

        for step in steps {
            let _ = match step {
                Share::Map { src, src_page, dst, dst_page, perm } => {
                    k.page_map(root, ids[src], src_page, ids[dst], dst_page, perm)
                }
                Share::Send { from, to, src_page, dst_page, perm } => {
                    k.ipc_recv(ids[to], PageArg::Page(dst_page))
                        .and_then(|()| k.ipc_try_send(ids[from], ids[to], 0, PageArg::Page(src_page), perm))
                }
                Share::Unmap { env, page } => k.page_unmap(root, ids[env], page),
            };
            for perm in grants_of(&k, frame) {
                prop_assert!(!perm.is_write_eligible(), "frame granted {:?}", perm);
            }
            prop_assert_eq!(k.check_invariants(), Ok(()));
        }
    }
}
