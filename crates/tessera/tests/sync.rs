// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic

//! Root replication between two nodes over loopback.

mod common;

use common::{wait_until, Lobby, Pair, PairBuilder, TestRoot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tessera::{FrameKind, SyncError};

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn test_create_update_destroy_replay() {
    let pair = Pair::open();
    let owner = pair.client_conn().sync().expect("sync");
    let observer = pair.server_conn().sync().expect("sync");

    let lobby = owner
        .create(Lobby {
            title: "friday".into(),
            players: vec!["ada".into()],
            open: true,
        })
        .expect("create");
    lobby
        .write(|l| l.players.push("grace".into()))
        .expect("write");
    lobby.write(|l| l.open = false).expect("write");

    let expected = lobby.read(Clone::clone);
    assert!(wait_until(WAIT, || {
        observer
            .observed::<Lobby>(lobby.id())
            .is_some_and(|mirror| mirror.read(Clone::clone) == expected)
    }));

    lobby.destroy().expect("destroy");
    assert!(wait_until(WAIT, || observer.observed_count() == 0));
    assert_eq!(owner.owned_count(), 0);
}

#[test]
fn test_test_root_create_handler_fires_once_then_value_tracks() {
    let created = Arc::new(Mutex::new(Vec::new()));
    let updates = Arc::new(AtomicUsize::new(0));
    let builder = {
        let created = Arc::clone(&created);
        let updates = Arc::clone(&updates);
        PairBuilder::new().server_init(move |conn| {
            let sync = conn.sync().expect("sync installed");
            let created = Arc::clone(&created);
            sync.create_handler::<TestRoot, _>(move |root| {
                created.lock().expect("created").push(root.read(|r| r.value));
            })
            .expect("create handler");
            let updates = Arc::clone(&updates);
            sync.update_handler::<TestRoot, _>(move |_, _| {
                updates.fetch_add(1, Ordering::SeqCst);
            })
            .expect("update handler");
        })
    };
    let pair = Pair::open_with(builder);
    let owner = pair.client_conn().sync().expect("sync");
    let observer = pair.server_conn().sync().expect("sync");

    let root = owner.create(TestRoot::default()).expect("create");
    root.write(|r| r.value = 42).expect("write");

    assert!(wait_until(WAIT, || {
        observer
            .observed::<TestRoot>(root.id())
            .is_some_and(|mirror| mirror.read(|r| r.value) == 42)
    }));
    assert_eq!(*created.lock().expect("created"), vec![0]);
    assert_eq!(updates.load(Ordering::SeqCst), 1);
    assert!(observer.is_ready());
}

#[test]
fn test_stray_update_after_destroy_is_dropped() {
    let pair = Pair::open();
    let owner = pair.client_conn().sync().expect("sync");
    let observer = pair.server_conn().sync().expect("sync");

    let root = owner.create(TestRoot { value: 5 }).expect("create");
    assert!(wait_until(WAIT, || observer.observed_count() == 1));
    root.destroy().expect("destroy");
    assert!(wait_until(WAIT, || observer.observed_count() == 0));

    // An update for the destroyed id, as a misbehaving peer would send it.
    let type_id = pair
        .server
        .registry()
        .root_id::<TestRoot>()
        .expect("registered");
    let mut frame = vec![FrameKind::SyncUpdate.as_u8()];
    frame.extend_from_slice(&type_id.to_le_bytes());
    frame.extend_from_slice(&root.id().to_le_bytes());
    frame.extend_from_slice(&0u16.to_le_bytes());
    frame.extend_from_slice(&99i32.to_le_bytes());
    pair.server.on_data(pair.link.peer_a(), &frame);

    assert_eq!(observer.observed_count(), 0);
    assert!(observer.observed::<TestRoot>(root.id()).is_none());
    assert!(matches!(root.write(|r| r.value = 1), Err(SyncError::Destroyed)));
}

#[test]
fn test_both_sides_own_roots_independently() {
    let pair = Pair::open();
    let client_sync = pair.client_conn().sync().expect("sync");
    let server_sync = pair.server_conn().sync().expect("sync");

    let mine = client_sync.create(TestRoot { value: 1 }).expect("client");
    let theirs = server_sync.create(TestRoot { value: 2 }).expect("server");
    assert_eq!(mine.id(), theirs.id());

    assert!(wait_until(WAIT, || {
        client_sync.observed_count() == 1 && server_sync.observed_count() == 1
    }));
    let on_server = server_sync.observed::<TestRoot>(mine.id()).expect("mirror");
    let on_client = client_sync.observed::<TestRoot>(theirs.id()).expect("mirror");
    assert_eq!(on_server.read(|r| r.value), 1);
    assert_eq!(on_client.read(|r| r.value), 2);
    assert!(matches!(
        on_client.write(|r| r.value = 3),
        Err(SyncError::NotAuthority)
    ));
}

#[test]
fn test_observed_of_lists_by_type() {
    let pair = Pair::open();
    let owner = pair.client_conn().sync().expect("sync");
    let observer = pair.server_conn().sync().expect("sync");

    for value in 0..3 {
        owner.create(TestRoot { value }).expect("root");
    }
    owner.create(Lobby::default()).expect("lobby");
    assert!(wait_until(WAIT, || observer.observed_count() == 4));

    let roots = observer.observed_of::<TestRoot>();
    let values: Vec<i32> = roots.iter().map(|r| r.read(|r| r.value)).collect();
    assert_eq!(values, vec![0, 1, 2]);
    assert_eq!(observer.observed_of::<Lobby>().len(), 1);
}

#[test]
fn test_random_writes_converge() {
    let pair = Pair::open();
    let owner = pair.client_conn().sync().expect("sync");
    let observer = pair.server_conn().sync().expect("sync");

    let mut rng = fastrand::Rng::with_seed(0x7e55e7a);
    let lobby = owner.create(Lobby::default()).expect("create");
    for step in 0..200 {
        let written = match rng.u8(0..4) {
            0 => lobby.write(|l| l.title = format!("room {}", rng.u16(..))),
            1 => lobby.write(|l| l.players.push(format!("p{}", step))),
            2 => lobby.write(|l| {
                if !l.players.is_empty() {
                    let at = rng.usize(0..l.players.len());
                    l.players.remove(at);
                }
            }),
            _ => lobby.write(|l| l.open = rng.bool()),
        };
        written.expect("write");
    }

    let expected = lobby.read(Clone::clone);
    assert!(wait_until(WAIT, || {
        observer
            .observed::<Lobby>(lobby.id())
            .is_some_and(|mirror| mirror.read(Clone::clone) == expected)
    }));
}
