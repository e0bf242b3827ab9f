// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::config::NodeConfig;
use crate::error::ProtocolError;
use crate::feature::Feature;
use crate::frame::{FrameHeader, FrameKind};
use crate::node::link::tests::{test_link, RecordingTransport};
use crate::registry::TypeRegistry;
use crate::ser::Deserializer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Clone, PartialEq)]
struct Counter {
    label: String,
    value: i64,
    enabled: bool,
}

impl SyncRoot for Counter {
    const TYPE_NAME: &'static str = "test::Counter";

    fn describe(table: &mut FieldTable<Self>) {
        table
            .value("label", |c| &c.label, |c| &mut c.label)
            .value("value", |c| &c.value, |c| &mut c.value)
            .value("enabled", |c| &c.enabled, |c| &mut c.enabled);
    }
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_root::<Counter>().expect("counter");
    registry
}

fn manager(config: NodeConfig) -> (Arc<SyncManager>, Arc<RecordingTransport>) {
    let (link, wire) = test_link(registry(), config);
    let manager = SyncManager::new(link);
    manager.enable();
    (manager, wire)
}

fn open_pair() -> (
    (Arc<SyncManager>, Arc<RecordingTransport>),
    (Arc<SyncManager>, Arc<RecordingTransport>),
) {
    let config = NodeConfig::default().with_handshake(false);
    (manager(config.clone()), manager(config))
}

fn deliver(to: &SyncManager, frames: Vec<Vec<u8>>) -> Vec<Result<(), ProtocolError>> {
    frames
        .into_iter()
        .map(|frame| {
            let mut r = Deserializer::from_bytes(&frame);
            let header = FrameHeader::read(&mut r)?;
            to.handle_frame(&header, &mut r)
        })
        .collect()
}

fn kinds(frames: &[Vec<u8>]) -> Vec<FrameKind> {
    frames
        .iter()
        .map(|frame| FrameKind::from_u8(frame[0]).expect("kind"))
        .collect()
}

#[test]
fn test_create_update_destroy_replay() {
    let ((owner, owner_wire), (observer, _)) = open_pair();
    let root = owner
        .create(Counter {
            label: "hits".into(),
            value: 1,
            enabled: false,
        })
        .expect("create");
    assert!(root.is_authority());
    assert_eq!(root.id(), 1);

    root.write(|c| c.value = 7).expect("write");
    root.write(|c| {
        c.label = "misses".into();
        c.enabled = true;
    })
    .expect("write");

    let frames = owner_wire.take();
    assert_eq!(
        kinds(&frames),
        vec![
            FrameKind::SyncCreate,
            FrameKind::SyncUpdate,
            FrameKind::SyncUpdate,
            FrameKind::SyncUpdate,
        ]
    );
    for result in deliver(&observer, frames) {
        result.expect("observer applies");
    }

    let mirror = observer.observed::<Counter>(root.id()).expect("mirrored");
    assert!(!mirror.is_authority());
    assert_eq!(mirror.read(Clone::clone), root.read(Clone::clone));

    root.destroy().expect("destroy");
    assert!(root.is_destroyed());
    assert_eq!(owner.owned_count(), 0);
    for result in deliver(&observer, owner_wire.take()) {
        result.expect("observer destroys");
    }
    assert!(mirror.is_destroyed());
    assert_eq!(observer.observed_count(), 0);
}

#[test]
fn test_unchanged_write_sends_nothing() {
    let ((owner, owner_wire), _) = open_pair();
    let root = owner.create(Counter::default()).expect("create");
    owner_wire.take();

    root.write(|c| c.value = 0).expect("write");
    assert!(owner_wire.take().is_empty());
    assert!(root.dirty_fields().is_empty());
}

#[test]
fn test_stray_update_after_destroy() {
    let ((owner, owner_wire), (observer, _)) = open_pair();
    let root = owner.create(Counter::default()).expect("create");
    deliver(&observer, owner_wire.take());

    root.write(|c| c.value = 3).expect("write");
    let update = owner_wire.take();
    root.destroy().expect("destroy");
    deliver(&observer, owner_wire.take());

    let results = deliver(&observer, update);
    assert!(matches!(results[0], Err(ProtocolError::UnknownRoot(1))));
    assert!(matches!(root.write(|c| c.value = 4), Err(SyncError::Destroyed)));
    assert!(matches!(root.destroy(), Err(SyncError::Destroyed)));
}

#[test]
fn test_observer_cannot_write() {
    let ((owner, owner_wire), (observer, observer_wire)) = open_pair();
    owner.create(Counter::default()).expect("create");
    deliver(&observer, owner_wire.take());

    let mirror = observer.observed::<Counter>(1).expect("mirrored");
    assert!(matches!(mirror.write(|c| c.value = 1), Err(SyncError::NotAuthority)));
    assert!(matches!(mirror.flush(), Err(SyncError::NotAuthority)));
    assert!(matches!(mirror.destroy(), Err(SyncError::NotAuthority)));
    assert!(observer_wire.take().is_empty());
}

#[test]
fn test_create_handler_sees_initial_state() {
    let ((owner, owner_wire), (observer, _)) = open_pair();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let updates = Arc::new(AtomicUsize::new(0));
    {
        let seen = Arc::clone(&seen);
        observer
            .create_handler::<Counter, _>(move |root| {
                seen.lock().expect("seen").push(root.read(|c| c.value));
            })
            .expect("create handler");
    }
    {
        let updates = Arc::clone(&updates);
        observer
            .update_handler::<Counter, _>(move |root, field| {
                assert_eq!(root.fields().name(field), Some("value"));
                updates.fetch_add(1, Ordering::SeqCst);
            })
            .expect("update handler");
    }

    let root = owner.create(Counter::default()).expect("create");
    root.write(|c| c.value = 42).expect("write");
    deliver(&observer, owner_wire.take());

    assert_eq!(*seen.lock().expect("seen"), vec![0]);
    assert_eq!(updates.load(Ordering::SeqCst), 1);
    let mirror = observer.observed::<Counter>(root.id()).expect("mirrored");
    assert_eq!(mirror.read(|c| c.value), 42);
}

#[test]
fn test_stage_then_flush() {
    let ((owner, owner_wire), (observer, _)) = open_pair();
    let root = owner.create(Counter::default()).expect("create");
    deliver(&observer, owner_wire.take());

    root.stage(|c| c.value = 9).expect("stage");
    root.stage(|c| c.value = 10).expect("stage");
    assert!(owner_wire.take().is_empty());
    assert_eq!(root.dirty_fields(), vec![1]);

    root.mark_dirty(0).expect("mark");
    assert!(matches!(root.mark_dirty(9), Err(SyncError::UnknownField(9))));
    assert_eq!(root.flush().expect("flush"), 2);
    assert_eq!(root.flush().expect("flush"), 0);
    deliver(&observer, owner_wire.take());

    let mirror = observer.observed::<Counter>(root.id()).expect("mirrored");
    assert_eq!(mirror.read(|c| c.value), 10);
}

#[test]
fn test_auto_flush_off_keeps_fields_dirty() {
    let config = NodeConfig::default()
        .with_handshake(false)
        .with_auto_flush(false);
    let (owner, owner_wire) = manager(config);
    let root = owner.create(Counter::default()).expect("create");
    owner_wire.take();

    root.write(|c| c.enabled = true).expect("write");
    assert!(owner_wire.take().is_empty());
    assert_eq!(root.dirty_fields(), vec![2]);
    assert_eq!(root.flush().expect("flush"), 1);
}

#[test]
fn test_ids_are_unique_among_live_roots() {
    let ((owner, _), _) = open_pair();
    let a = owner.create(Counter::default()).expect("a");
    let b = owner.create(Counter::default()).expect("b");
    assert_ne!(a.id(), b.id());
    a.destroy().expect("destroy");
    let c = owner.create(Counter::default()).expect("c");
    assert_ne!(c.id(), b.id());
    assert_eq!(owner.owned_count(), 2);
}

#[test]
fn test_duplicate_create_and_unknown_field() {
    let ((owner, owner_wire), (observer, _)) = open_pair();
    owner.create(Counter::default()).expect("create");
    let create = owner_wire.take();

    deliver(&observer, create.clone());
    let results = deliver(&observer, create);
    assert!(matches!(results[0], Err(ProtocolError::DuplicateRoot(1))));

    // [SyncUpdate][type][root 1][field 7]
    let type_id = observer
        .link()
        .registry()
        .root_id::<Counter>()
        .expect("registered");
    let mut bogus = vec![FrameKind::SyncUpdate.as_u8()];
    bogus.extend_from_slice(&type_id.to_le_bytes());
    bogus.extend_from_slice(&1u16.to_le_bytes());
    bogus.extend_from_slice(&7u16.to_le_bytes());
    let results = deliver(&observer, vec![bogus]);
    assert!(matches!(
        results[0],
        Err(ProtocolError::UnknownField { root: 1, field: 7 })
    ));
}

#[test]
fn test_gated_until_open() {
    let (owner, wire) = manager(NodeConfig::default());
    assert!(matches!(
        owner.create(Counter::default()),
        Err(SyncError::NotAuthenticated)
    ));
    assert!(wire.take().is_empty());
    assert_eq!(owner.owned_count(), 0);
}

#[test]
fn test_ready_fires_once_after_first_create() {
    let ((owner, owner_wire), (observer, _)) = open_pair();
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let fired = Arc::clone(&fired);
        observer.on_ready(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert!(!observer.is_ready());

    owner.create(Counter::default()).expect("a");
    owner.create(Counter::default()).expect("b");
    deliver(&observer, owner_wire.take());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Late subscribers run immediately.
    let late = Arc::new(AtomicUsize::new(0));
    {
        let late = Arc::clone(&late);
        observer.on_ready(move || {
            late.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(late.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disable_destroys_everything() {
    let ((owner, owner_wire), (observer, _)) = open_pair();
    let destroyed = Arc::new(AtomicUsize::new(0));
    {
        let destroyed = Arc::clone(&destroyed);
        observer
            .destroy_handler::<Counter, _>(move |root| {
                assert!(root.is_destroyed());
                destroyed.fetch_add(1, Ordering::SeqCst);
            })
            .expect("destroy handler");
    }
    let root = owner.create(Counter::default()).expect("create");
    deliver(&observer, owner_wire.take());

    assert!(owner.disable());
    assert!(root.is_destroyed());
    assert!(matches!(root.write(|c| c.value = 1), Err(SyncError::Destroyed)));
    assert!(owner_wire.take().is_empty());

    assert!(observer.disable());
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(observer.observed_count(), 0);
    assert!(matches!(
        observer.create(Counter::default()),
        Err(SyncError::Disabled)
    ));
}
